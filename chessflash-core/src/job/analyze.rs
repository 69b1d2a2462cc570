use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::classification::evaluate_move;
use crate::domain::{AnalysisStatus, Color, Flashcard, Game, MoveClassification, Position};
use crate::engine::{Engine, EngineFactory};
use crate::error::{AnalyzeError, JobError};
use crate::opening_book;
use crate::pgn;
use crate::repository::{GameRepository, StatsRepository};

use super::{Job, JobScope};

/// Replays one game's movetext through the engine, records a `Position` row
/// per ply, gates flashcards on the player's own mistakes/blunders, and
/// leaves the game `Completed` or `Failed`.
pub struct AnalyzeGame {
    game_id: String,
    game_repo: Arc<dyn GameRepository>,
    stats_repo: Arc<dyn StatsRepository>,
    engine_factory: Arc<dyn EngineFactory>,
    engine_path: String,
    depth: u32,
}

impl AnalyzeGame {
    pub fn new(
        game_id: String,
        game_repo: Arc<dyn GameRepository>,
        stats_repo: Arc<dyn StatsRepository>,
        engine_factory: Arc<dyn EngineFactory>,
        engine_path: String,
        depth: u32,
    ) -> Self {
        AnalyzeGame {
            game_id,
            game_repo,
            stats_repo,
            engine_factory,
            engine_path,
            depth: if depth == 0 { 18 } else { depth },
        }
    }
}

#[async_trait]
impl Job for AnalyzeGame {
    fn name(&self) -> &str {
        "analyze_game"
    }

    async fn run(&self, scope: &JobScope) -> Result<(), JobError> {
        self.run_inner(scope).await.map_err(JobError::from)
    }
}

impl AnalyzeGame {
    async fn run_inner(&self, scope: &JobScope) -> Result<(), AnalyzeError> {
        let game = self
            .game_repo
            .get(&self.game_id)
            .await?
            .ok_or_else(|| AnalyzeError::GameNotFound(self.game_id.clone()))?;

        // Idempotent: re-running an already-completed analysis is a no-op.
        if matches!(game.status, AnalysisStatus::Completed) {
            return Ok(());
        }

        self.game_repo.update_status(&self.game_id, AnalysisStatus::Processing).await?;

        let engine = self
            .engine_factory
            .new_engine(&self.engine_path)
            .await
            .map_err(AnalyzeError::from)?;

        let result = self.analyze_with_engine(scope, &game, engine.as_ref()).await;
        engine.close().await;

        match result {
            Ok(()) => {
                self.game_repo.update_status(&self.game_id, AnalysisStatus::Completed).await?;
                self.stats_repo.refresh_profile_stats(&game.profile_id).await?;
                Ok(())
            }
            Err(AnalyzeError::Cancelled) => Err(AnalyzeError::Cancelled),
            Err(err) => {
                self.game_repo.update_status(&self.game_id, AnalysisStatus::Failed).await?;
                Err(err)
            }
        }
    }

    async fn analyze_with_engine(
        &self,
        scope: &JobScope,
        game: &Game,
        engine: &dyn Engine,
    ) -> Result<(), AnalyzeError> {
        let (positions, moves) = pgn::replay_positions(&game.pgn)?;
        let ply_count = moves.len().min(positions.len().saturating_sub(1));

        if game.opening_name.is_none() {
            if let Some((eco, name)) = opening_book::lookup(&moves) {
                self.game_repo.update_opening(&self.game_id, eco, name).await?;
            }
        }

        let mut prior = engine
            .evaluate_fen(scope, &positions[0], self.depth)
            .await
            .map_err(AnalyzeError::from)?;

        for i in 0..ply_count {
            if scope.is_cancelled() {
                return Err(AnalyzeError::Cancelled);
            }

            let mover = if i % 2 == 0 { Color::White } else { Color::Black };
            let after = engine
                .evaluate_fen(scope, &positions[i + 1], self.depth)
                .await
                .map_err(AnalyzeError::from)?;

            let evaluation = evaluate_move(mover, &prior, &after);

            let position = Position {
                game_id: game.id.clone(),
                move_number: i as u32,
                fen_before: positions[i].clone(),
                move_played: moves[i].clone(),
                best_move: prior.best_move.clone(),
                eval_before_cp: evaluation.eval_before_cp,
                eval_after_cp: evaluation.eval_after_cp,
                eval_delta: evaluation.eval_delta,
                mate_before: evaluation.mate_before,
                mate_after: evaluation.mate_after,
                classification: evaluation.classification,
            };
            self.game_repo.insert_position(position).await?;

            if mover == game.played_as
                && matches!(evaluation.classification, MoveClassification::Mistake | MoveClassification::Blunder)
            {
                let flashcard = Flashcard::new(game.id.clone(), i as u32, Utc::now());
                self.game_repo.insert_flashcard(flashcard).await?;
            }

            prior = after;
        }

        Ok(())
    }
}
