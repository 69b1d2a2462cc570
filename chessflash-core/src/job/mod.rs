mod analyze;
mod import;

pub use analyze::AnalyzeGame;
pub use import::ImportGames;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

/// Per-job cancellation and logging capability, handed to `Job::run` instead
/// of a global logger or a bare token. Cloning is cheap; `child()` derives a
/// scope whose cancellation follows its parent's.
#[derive(Clone)]
pub struct JobScope {
    token: CancellationToken,
    span: tracing::Span,
}

impl JobScope {
    pub fn new(token: CancellationToken, span: tracing::Span) -> Self {
        JobScope { token, span }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn child(&self) -> JobScope {
        JobScope {
            token: self.token.child_token(),
            span: self.span.clone(),
        }
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

/// A unit of work the pool can run. `name` is used for logging; `run` does
/// the actual work and must check `scope.is_cancelled()` at points where
/// cancellation should take effect promptly.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, scope: &JobScope) -> Result<(), JobError>;
}

pub type BoxedJob = Box<dyn Job>;
