//! Layered error types, one per fallible surface.

use thiserror::Error;

/// Errors the worker pool itself can raise.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool is stopped")]
    Stopped,
    #[error("pool queue is full")]
    QueueFull,
}

/// Errors surfaced by the job-queue façade, one layer above the pool.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("profile lookup failed: {0}")]
    ProfileLookup(#[from] RepoError),
}

/// Opaque error from a repository collaborator. The storage format and
/// failure taxonomy live outside this crate; callers only need to know the
/// call failed.
#[derive(Debug, Error, Clone)]
#[error("repository error: {0}")]
pub struct RepoError(pub String);

/// Error from the chess-service HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("chess service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chess service returned an unexpected response: {0}")]
    Decode(String),
    #[error("cancelled")]
    Cancelled,
}

/// Error from the engine subprocess driver's contract.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine failed to start: {0}")]
    StartFailed(String),
    #[error("engine evaluation failed: {0}")]
    EvalFailed(String),
}

/// Error raised while replaying a game's movetext.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PgnError {
    #[error("pgn movetext unparseable at move {0}: {1}")]
    Unparseable(usize, String),
}

/// Errors the import job can fail with.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("cancelled")]
    Cancelled,
}

/// Errors the analyze job can fail with.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("game {0} not found")]
    GameNotFound(String),
    #[error(transparent)]
    Pgn(#[from] PgnError),
    #[error("engine failed to start: {0}")]
    EngineStartFailed(String),
    #[error("engine evaluation failed: {0}")]
    EngineEvalFailed(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("cancelled")]
    Cancelled,
}

impl From<EngineError> for AnalyzeError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::StartFailed(msg) => AnalyzeError::EngineStartFailed(msg),
            EngineError::EvalFailed(msg) => AnalyzeError::EngineEvalFailed(msg),
        }
    }
}

/// The error type a `Job::run` returns. Both concrete jobs fold their own
/// error enum down into this one so the pool only has to log a single type.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error("cancelled")]
    Cancelled,
}
