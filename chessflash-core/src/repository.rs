//! Repository contracts. Storage format and query strategy live outside this
//! crate; these traits are the only thing the job-scheduling core depends on.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AnalysisStatus, Flashcard, Game, PendingAnalysisFilter, Position, Profile};
use crate::error::RepoError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Profile>, RepoError>;
    async fn get_by_username(&self, username: &str) -> Result<Option<Profile>, RepoError>;
    async fn upsert(&self, username: &str) -> Result<Profile, RepoError>;
    async fn update_sync(&self, id: &str, at: DateTime<Utc>) -> Result<(), RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Game>, RepoError>;
    async fn get_existing_external_ids(&self, profile_id: &str) -> Result<HashSet<String>, RepoError>;
    async fn insert_batch(&self, games: Vec<Game>) -> Result<Vec<String>, RepoError>;
    async fn games_for_analysis(&self, filter: &PendingAnalysisFilter) -> Result<Vec<Game>, RepoError>;
    async fn count_pending_analysis(&self) -> Result<usize, RepoError>;
    async fn update_status(&self, id: &str, status: AnalysisStatus) -> Result<(), RepoError>;
    async fn update_opening(&self, id: &str, eco_code: &str, name: &str) -> Result<(), RepoError>;
    async fn insert_position(&self, position: Position) -> Result<(), RepoError>;
    async fn insert_flashcard(&self, flashcard: Flashcard) -> Result<(), RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn refresh_profile_stats(&self, profile_id: &str) -> Result<(), RepoError>;
}
