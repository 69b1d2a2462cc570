//! The engine subprocess driver's contract. No concrete engine implementation
//! ships in this crate: process management is an external collaborator.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::job::JobScope;

/// One engine evaluation, reported from white's perspective (positive favors
/// white) per the `Centipawn` convention. `mate` is `Some(n)` when the engine
/// found a forced mate in `n` plies; its sign follows the same convention.
#[derive(Debug, Clone)]
pub struct EngineEval {
    pub cp: i32,
    pub mate: Option<i32>,
    pub best_move: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Engine: Send + Sync {
    async fn evaluate_fen(&self, scope: &JobScope, fen: &str, depth: u32) -> Result<EngineEval, EngineError>;
    /// Releases the subprocess. Called exactly once, on every exit path,
    /// regardless of whether analysis succeeded.
    async fn close(&self);
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn new_engine(&self, path: &str) -> Result<Box<dyn Engine>, EngineError>;
}
