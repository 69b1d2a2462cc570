use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::chess_client::{ChessServiceClient, MonthlyGame};
use crate::domain::{AnalysisStatus, Color, Game, Profile};
use crate::error::{ImportError, JobError};
use crate::pgn;
use crate::repository::{GameRepository, ProfileRepository, StatsRepository};

use super::{Job, JobScope};

/// Fetches a profile's monthly archives, fans them out to the chess service
/// under a concurrency cap, dedupes against already-imported games, and
/// inserts the remainder in one batch.
pub struct ImportGames {
    profile: Profile,
    archive_limit: usize,
    fanout: usize,
    client: Arc<dyn ChessServiceClient>,
    game_repo: Arc<dyn GameRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    stats_repo: Arc<dyn StatsRepository>,
}

impl ImportGames {
    pub fn new(
        profile: Profile,
        archive_limit: usize,
        fanout: usize,
        client: Arc<dyn ChessServiceClient>,
        game_repo: Arc<dyn GameRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
        stats_repo: Arc<dyn StatsRepository>,
    ) -> Self {
        ImportGames {
            profile,
            archive_limit,
            fanout: if fanout == 0 { 10 } else { fanout },
            client,
            game_repo,
            profile_repo,
            stats_repo,
        }
    }
}

#[async_trait]
impl Job for ImportGames {
    fn name(&self) -> &str {
        "import_games"
    }

    async fn run(&self, scope: &JobScope) -> Result<(), JobError> {
        self.run_inner(scope).await.map_err(JobError::from)
    }
}

/// Keeps archives on or after the profile's last sync month; unparsable
/// entries are discarded rather than risking a re-import of the whole history.
/// `limit == 0` means unbounded.
fn filter_archives(archives: Vec<String>, last_sync: Option<DateTime<Utc>>, limit: usize) -> Vec<String> {
    use chrono::Datelike;

    let mut filtered: Vec<String> = archives
        .into_iter()
        .filter(|url| match (pgn::parse_archive_date(url), last_sync) {
            (Some((year, month)), Some(last)) => {
                (year, month) >= (last.year(), last.month())
            }
            (Some(_), None) => true,
            (None, _) => false,
        })
        .collect();

    if limit > 0 && filtered.len() > limit {
        let drop = filtered.len() - limit;
        filtered.drain(..drop);
    }
    filtered
}

fn build_game(profile: &Profile, monthly: MonthlyGame, external_id: String) -> Game {
    let headers = pgn::parse_headers(&monthly.pgn);
    let played_as = if monthly.white.username.eq_ignore_ascii_case(&profile.username) {
        Color::White
    } else {
        Color::Black
    };

    let (opponent, player_result_raw, player_header, opponent_header, mover, foe) = match played_as {
        Color::White => (
            monthly.black.username.clone(),
            monthly.white.result.clone(),
            headers.get("WhiteElo"),
            headers.get("BlackElo"),
            &monthly.white,
            &monthly.black,
        ),
        Color::Black => (
            monthly.white.username.clone(),
            monthly.black.result.clone(),
            headers.get("BlackElo"),
            headers.get("WhiteElo"),
            &monthly.black,
            &monthly.white,
        ),
    };

    let player_rating = player_header.and_then(|s| s.parse().ok()).or(mover.rating);
    let opponent_rating = opponent_header.and_then(|s| s.parse().ok()).or(foe.rating);

    Game {
        id: uuid::Uuid::new_v4().to_string(),
        profile_id: profile.id.clone(),
        external_id,
        pgn: monthly.pgn,
        time_class: monthly.time_class,
        result: pgn::normalize_result(&player_result_raw),
        played_as,
        opponent,
        player_rating,
        opponent_rating,
        played_at: DateTime::from_timestamp(monthly.end_time, 0).unwrap_or_else(Utc::now),
        eco_code: headers.get("ECO").cloned(),
        opening_name: headers.get("Opening").cloned(),
        opening_url: headers.get("ECOUrl").cloned(),
        status: AnalysisStatus::Pending,
    }
}

impl ImportGames {
    async fn run_inner(&self, scope: &JobScope) -> Result<(), ImportError> {
        let archives = self.client.fetch_archives(scope, &self.profile.username).await?;
        let archives = filter_archives(archives, self.profile.last_synced_at, self.archive_limit);

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.fanout));
        let (tx, mut rx) = tokio::sync::mpsc::channel(archives.len().max(1));
        let mut handles = Vec::with_capacity(archives.len());

        for url in archives {
            let semaphore = semaphore.clone();
            let client = self.client.clone();
            let child_scope = scope.child();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if child_scope.is_cancelled() {
                    return;
                }
                match client.fetch_monthly(&child_scope, &url).await {
                    Ok(games) => {
                        let _ = tx.send(games).await;
                    }
                    Err(err) => {
                        tracing::warn!(archive = %url, error = %err, "import: fetching monthly archive failed");
                    }
                }
            }));
        }
        drop(tx);

        let mut seen = self.game_repo.get_existing_external_ids(&self.profile.id).await?;
        let mut new_games = Vec::new();
        while let Some(monthly_games) = rx.recv().await {
            if scope.is_cancelled() {
                break;
            }
            for monthly in monthly_games {
                let external_id = pgn::extract_external_id(&monthly.url);
                if seen.contains(&external_id) {
                    continue;
                }
                seen.insert(external_id.clone());
                new_games.push(build_game(&self.profile, monthly, external_id));
            }
        }

        for handle in handles {
            let _ = handle.await;
        }

        if scope.is_cancelled() {
            return Err(ImportError::Cancelled);
        }

        if !new_games.is_empty() {
            self.game_repo.insert_batch(new_games).await?;
        }

        self.profile_repo.update_sync(&self.profile.id, Utc::now()).await?;
        self.stats_repo.refresh_profile_stats(&self.profile.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_archives_before_last_sync() {
        use chrono::Datelike;
        let last_sync = Utc::now().with_year(2024).unwrap().with_month(3).unwrap();
        let archives = vec![
            "https://api.chess.com/pub/player/x/games/2024/01".to_string(),
            "https://api.chess.com/pub/player/x/games/2024/03".to_string(),
            "https://api.chess.com/pub/player/x/games/2024/05".to_string(),
        ];
        let kept = filter_archives(archives, Some(last_sync), 0);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|u| !u.ends_with("/01")));
    }

    #[test]
    fn archive_limit_keeps_most_recent() {
        let archives = vec![
            "https://api.chess.com/pub/player/x/games/2024/01".to_string(),
            "https://api.chess.com/pub/player/x/games/2024/02".to_string(),
            "https://api.chess.com/pub/player/x/games/2024/03".to_string(),
        ];
        let kept = filter_archives(archives, None, 2);
        assert_eq!(kept, vec![
            "https://api.chess.com/pub/player/x/games/2024/02",
            "https://api.chess.com/pub/player/x/games/2024/03",
        ]);
    }

    #[test]
    fn discards_unparsable_archives_when_filtering_by_date() {
        let last_sync = Utc::now();
        let archives = vec!["not-a-real-archive-url".to_string()];
        let kept = filter_archives(archives, Some(last_sync), 0);
        assert!(kept.is_empty());
    }
}
