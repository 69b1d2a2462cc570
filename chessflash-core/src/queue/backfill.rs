//! Tick-based loop that keeps the analysis pool topped up with pending
//! analysis jobs pulled from the repository, arming a refill sweep while the
//! queue has headroom and backing off once it's nearly full again.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::PendingAnalysisFilter;
use crate::engine::EngineFactory;
use crate::error::PoolError;
use crate::job::AnalyzeGame;
use crate::pool::WorkerPool;
use crate::repository::{GameRepository, StatsRepository};

const TICK: Duration = Duration::from_secs(2);
/// Skip a tick once depth reaches 80% of capacity — leaves headroom and
/// avoids thrashing on every drained slot.
const ARM_THRESHOLD: f64 = 0.8;
/// Stop submitting mid-tick once depth reaches 90% of capacity; resume on
/// the next tick.
const BURST_STOP_THRESHOLD: f64 = 0.9;

/// Backfill state, owned by the façade and guarded by a single mutex: the
/// loop exists iff `running` is true; `filter` may be updated while running
/// and the next tick picks up the latest value.
pub struct BackfillState {
    pub running: bool,
    pub filter: Option<PendingAnalysisFilter>,
    pub cancel: Option<CancellationToken>,
    pub handle: Option<JoinHandle<()>>,
}

impl BackfillState {
    pub fn new() -> Self {
        BackfillState { running: false, filter: None, cancel: None, handle: None }
    }
}

impl Default for BackfillState {
    fn default() -> Self {
        Self::new()
    }
}

enum TickOutcome {
    Continue,
    Exit,
}

pub struct BackfillLoop {
    pool: Arc<WorkerPool>,
    game_repo: Arc<dyn GameRepository>,
    stats_repo: Arc<dyn StatsRepository>,
    engine_factory: Arc<dyn EngineFactory>,
    engine_path: String,
    depth: u32,
    state: Arc<Mutex<BackfillState>>,
}

impl BackfillLoop {
    pub fn new(
        pool: Arc<WorkerPool>,
        game_repo: Arc<dyn GameRepository>,
        stats_repo: Arc<dyn StatsRepository>,
        engine_factory: Arc<dyn EngineFactory>,
        engine_path: String,
        depth: u32,
        state: Arc<Mutex<BackfillState>>,
    ) -> Self {
        BackfillLoop { pool, game_repo, stats_repo, engine_factory, engine_path, depth, state }
    }

    /// Runs until `cancel` fires or a tick declares the loop drained or
    /// terminated. Intended to be spawned as its own task.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(TICK) => {}
            }
            if let TickOutcome::Exit = self.tick().await {
                break;
            }
        }
    }

    async fn tick(&self) -> TickOutcome {
        if !self.pool.is_running() {
            return TickOutcome::Continue;
        }

        let capacity = self.pool.queue_capacity();
        if capacity == 0 {
            return TickOutcome::Continue;
        }

        let arm_threshold = (capacity as f64 * ARM_THRESHOLD).ceil() as usize;
        if self.pool.queue_size() >= arm_threshold {
            return TickOutcome::Continue;
        }

        let filter = match self.state.lock().unwrap().filter.clone() {
            Some(filter) => filter,
            None => return TickOutcome::Continue,
        };

        let games = match self.game_repo.games_for_analysis(&filter).await {
            Ok(games) => games,
            Err(err) => {
                tracing::warn!(error = %err, "backfill: fetching pending games failed");
                return TickOutcome::Continue;
            }
        };

        if games.is_empty() {
            let mut state = self.state.lock().unwrap();
            state.running = false;
            return TickOutcome::Exit;
        }

        let burst_stop = (capacity as f64 * BURST_STOP_THRESHOLD).ceil() as usize;
        for game in games {
            if self.pool.queue_size() >= burst_stop {
                break;
            }
            let job = AnalyzeGame::new(
                game.id,
                self.game_repo.clone(),
                self.stats_repo.clone(),
                self.engine_factory.clone(),
                self.engine_path.clone(),
                self.depth,
            );
            match self.pool.submit(Box::new(job)) {
                Ok(()) => {}
                Err(PoolError::QueueFull) => break,
                Err(PoolError::Stopped) => {
                    let mut state = self.state.lock().unwrap();
                    state.running = false;
                    return TickOutcome::Exit;
                }
            }
        }

        TickOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnalysisStatus, Color, Game, GameResult};
    use crate::repository::{MockGameRepository, MockStatsRepository};
    use chrono::Utc;

    fn sample_game(id: &str) -> Game {
        Game {
            id: id.to_string(),
            profile_id: "profile-1".to_string(),
            external_id: id.to_string(),
            pgn: "1. e4 e5 *".to_string(),
            time_class: "blitz".to_string(),
            result: GameResult::Win,
            played_as: Color::White,
            opponent: "foe".to_string(),
            player_rating: None,
            opponent_rating: None,
            played_at: Utc::now(),
            eco_code: None,
            opening_name: None,
            opening_url: None,
            status: AnalysisStatus::Pending,
        }
    }

    fn state_with_filter(filter: PendingAnalysisFilter) -> Arc<Mutex<BackfillState>> {
        Arc::new(Mutex::new(BackfillState {
            running: true,
            filter: Some(filter),
            cancel: None,
            handle: None,
        }))
    }

    #[tokio::test]
    async fn arms_refill_when_queue_has_headroom() {
        let pool = Arc::new(WorkerPool::new(0, 10));
        pool.start().await;

        let mut game_repo = MockGameRepository::new();
        game_repo
            .expect_games_for_analysis()
            .times(1)
            .returning(|_| Ok(vec![sample_game("g1"), sample_game("g2")]));
        let stats_repo = MockStatsRepository::new();
        let state = state_with_filter(PendingAnalysisFilter { profile_id: None, limit: 10 });

        let backfill = BackfillLoop::new(
            pool.clone(),
            Arc::new(game_repo),
            Arc::new(stats_repo),
            Arc::new(crate::engine::MockEngineFactory::new()),
            "stockfish".to_string(),
            18,
            state,
        );

        backfill.tick().await;
        assert_eq!(pool.queue_size(), 2);
    }

    #[tokio::test]
    async fn stays_dormant_once_depth_reaches_the_arm_threshold() {
        let pool = Arc::new(WorkerPool::new(0, 10));
        pool.start().await;
        // 8 of 10 slots filled == 80% depth, at the arm threshold.
        for _ in 0..8 {
            pool.submit(Box::new(AnalyzeGame::new(
                "filler".to_string(),
                Arc::new(MockGameRepository::new()),
                Arc::new(MockStatsRepository::new()),
                Arc::new(crate::engine::MockEngineFactory::new()),
                "stockfish".to_string(),
                18,
            )))
            .unwrap();
        }

        let mut game_repo = MockGameRepository::new();
        game_repo.expect_games_for_analysis().times(0);
        let state = state_with_filter(PendingAnalysisFilter { profile_id: None, limit: 10 });

        let backfill = BackfillLoop::new(
            pool.clone(),
            Arc::new(game_repo),
            Arc::new(MockStatsRepository::new()),
            Arc::new(crate::engine::MockEngineFactory::new()),
            "stockfish".to_string(),
            18,
            state,
        );

        backfill.tick().await;
        assert_eq!(pool.queue_size(), 8);
    }

    #[tokio::test]
    async fn empty_batch_drains_and_clears_running() {
        let pool = Arc::new(WorkerPool::new(0, 10));
        pool.start().await;

        let mut game_repo = MockGameRepository::new();
        game_repo.expect_games_for_analysis().times(1).returning(|_| Ok(vec![]));
        let state = state_with_filter(PendingAnalysisFilter { profile_id: None, limit: 10 });

        let backfill = BackfillLoop::new(
            pool.clone(),
            Arc::new(game_repo),
            Arc::new(MockStatsRepository::new()),
            Arc::new(crate::engine::MockEngineFactory::new()),
            "stockfish".to_string(),
            18,
            state.clone(),
        );

        let outcome = backfill.tick().await;
        assert!(matches!(outcome, TickOutcome::Exit));
        assert!(!state.lock().unwrap().running);
    }

    #[tokio::test]
    async fn skips_when_filter_is_absent() {
        let pool = Arc::new(WorkerPool::new(0, 10));
        pool.start().await;

        let mut game_repo = MockGameRepository::new();
        game_repo.expect_games_for_analysis().times(0);
        let state = Arc::new(Mutex::new(BackfillState::new()));

        let backfill = BackfillLoop::new(
            pool.clone(),
            Arc::new(game_repo),
            Arc::new(MockStatsRepository::new()),
            Arc::new(crate::engine::MockEngineFactory::new()),
            "stockfish".to_string(),
            18,
            state,
        );

        backfill.tick().await;
        assert_eq!(pool.queue_size(), 0);
    }
}
