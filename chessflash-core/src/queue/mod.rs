pub mod backfill;

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::chess_client::ChessServiceClient;
use crate::config::Config;
use crate::domain::PendingAnalysisFilter;
use crate::engine::EngineFactory;
use crate::error::{PoolError, QueueError};
use crate::job::{AnalyzeGame, ImportGames};
use crate::pool::WorkerPool;
use crate::repository::{GameRepository, ProfileRepository, StatsRepository};

use backfill::{BackfillLoop, BackfillState};

/// The single struct callers interact with: owns the worker pool and the
/// backfill loop's state, and turns "import this username" / "analyze this
/// game" requests into submitted jobs.
pub struct JobQueue {
    pool: Arc<WorkerPool>,
    config: Config,
    client: Arc<dyn ChessServiceClient>,
    profile_repo: Arc<dyn ProfileRepository>,
    game_repo: Arc<dyn GameRepository>,
    stats_repo: Arc<dyn StatsRepository>,
    engine_factory: Arc<dyn EngineFactory>,
    backfill_state: Arc<Mutex<BackfillState>>,
}

impl JobQueue {
    pub fn new(
        config: Config,
        client: Arc<dyn ChessServiceClient>,
        profile_repo: Arc<dyn ProfileRepository>,
        game_repo: Arc<dyn GameRepository>,
        stats_repo: Arc<dyn StatsRepository>,
        engine_factory: Arc<dyn EngineFactory>,
    ) -> Self {
        let pool = Arc::new(WorkerPool::new(config.workers, config.queue_capacity));
        JobQueue {
            pool,
            config,
            client,
            profile_repo,
            game_repo,
            stats_repo,
            engine_factory,
            backfill_state: Arc::new(Mutex::new(BackfillState::new())),
        }
    }

    /// Starts the worker pool. Call once at process startup; pair with
    /// `start_backfill` to arm automatic replenishment.
    pub async fn start(&self) {
        self.pool.start().await;
    }

    /// Stops the backfill loop (if running) and the worker pool, waiting for
    /// in-flight jobs to finish.
    pub async fn stop(&self) {
        self.stop_backfill().await;
        self.pool.stop().await;
    }

    /// Records `filter`. If the loop is not running, starts it. If already
    /// running, only updates the filter — the next tick picks it up. Safe to
    /// call repeatedly.
    pub fn start_backfill(&self, filter: PendingAnalysisFilter) {
        self.arm(Some(filter));
    }

    /// Cancels the loop's scope, awaits completion, and clears `running` and
    /// `filter`. Idempotent.
    pub async fn stop_backfill(&self) {
        let (cancel, handle) = {
            let mut state = self.backfill_state.lock().unwrap();
            state.running = false;
            state.filter = None;
            (state.cancel.take(), state.handle.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Transitions the backfill loop to running if it isn't already and a
    /// filter is known — either the one just passed in, or one recorded by
    /// an earlier `start_backfill` call. A no-op if already running or if no
    /// filter has ever been recorded. The whole decision is made under the
    /// state mutex; spawning the task happens after it's released.
    fn arm(&self, filter: Option<PendingAnalysisFilter>) {
        let cancel = {
            let mut state = self.backfill_state.lock().unwrap();
            if let Some(filter) = filter {
                state.filter = Some(filter);
            }
            if state.running || state.filter.is_none() {
                return;
            }
            state.running = true;
            let cancel = CancellationToken::new();
            state.cancel = Some(cancel.clone());
            cancel
        };

        let backfill = BackfillLoop::new(
            self.pool.clone(),
            self.game_repo.clone(),
            self.stats_repo.clone(),
            self.engine_factory.clone(),
            self.config.engine_path.clone(),
            self.config.depth,
            self.backfill_state.clone(),
        );
        let handle = tokio::spawn(async move { backfill.run(cancel).await });
        self.backfill_state.lock().unwrap().handle = Some(handle);
    }

    /// Upserts the profile and submits an import job for it.
    pub async fn enqueue_import(&self, username: &str) -> Result<(), QueueError> {
        let profile = match self.profile_repo.get_by_username(username).await? {
            Some(profile) => profile,
            None => self.profile_repo.upsert(username).await?,
        };
        let job = ImportGames::new(
            profile,
            self.config.archive_limit,
            self.config.fanout,
            self.client.clone(),
            self.game_repo.clone(),
            self.profile_repo.clone(),
            self.stats_repo.clone(),
        );
        self.pool.submit(Box::new(job)).map_err(QueueError::from)
    }

    /// Submits an analysis job for a single already-imported game. On
    /// `QueueFull`, arms the backfill loop so replenishment resumes once the
    /// pool drains; other errors propagate.
    pub fn enqueue_analysis(&self, game_id: &str) -> Result<(), QueueError> {
        let job = AnalyzeGame::new(
            game_id.to_string(),
            self.game_repo.clone(),
            self.stats_repo.clone(),
            self.engine_factory.clone(),
            self.config.engine_path.clone(),
            self.config.depth,
        );
        match self.pool.submit(Box::new(job)) {
            Ok(()) => Ok(()),
            Err(PoolError::QueueFull) => {
                self.arm(None);
                Err(QueueError::from(PoolError::QueueFull))
            }
            Err(err) => Err(QueueError::from(err)),
        }
    }

    pub fn queue_size(&self) -> usize {
        self.pool.queue_size()
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    pub fn is_backfill_running(&self) -> bool {
        self.backfill_state.lock().unwrap().running
    }
}
