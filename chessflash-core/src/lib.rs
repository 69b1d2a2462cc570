//! Job-scheduling and backfill core for a chess-training review pipeline.
//!
//! This crate owns the worker pool, the job abstraction, the job-queue
//! façade, the backfill loop, and the import/analyze jobs themselves. HTTP
//! handlers, the chess-service client's retry policy, the engine subprocess
//! driver, and the persistence layer's storage format are external
//! collaborators reached only through the traits in [`repository`],
//! [`chess_client`], and [`engine`].

pub mod chess_client;
pub mod classification;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod job;
mod opening_book;
pub mod pgn;
pub mod pool;
pub mod queue;
pub mod repository;

pub use config::Config;
pub use job::{Job, JobScope};
pub use pool::WorkerPool;
pub use queue::JobQueue;
