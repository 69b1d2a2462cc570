//! The chess-service HTTP client contract and its `reqwest`-backed implementation.
//! Retry/backoff policy is deliberately absent: that belongs to the caller's
//! deployment, not this crate.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ClientError;
use crate::job::JobScope;

#[derive(Debug, Clone)]
pub struct PlayerResult {
    pub username: String,
    pub rating: Option<i32>,
    pub result: String,
}

#[derive(Debug, Clone)]
pub struct MonthlyGame {
    pub pgn: String,
    pub url: String,
    pub time_class: String,
    pub end_time: i64,
    pub white: PlayerResult,
    pub black: PlayerResult,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChessServiceClient: Send + Sync {
    async fn fetch_archives(&self, scope: &JobScope, username: &str) -> Result<Vec<String>, ClientError>;
    async fn fetch_monthly(&self, scope: &JobScope, archive_url: &str) -> Result<Vec<MonthlyGame>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct ArchivesResponse {
    archives: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MonthlyResponse {
    games: Vec<RawGame>,
}

#[derive(Debug, Deserialize)]
struct RawGame {
    pgn: String,
    url: String,
    time_class: String,
    end_time: i64,
    white: RawPlayer,
    black: RawPlayer,
}

#[derive(Debug, Deserialize)]
struct RawPlayer {
    username: String,
    rating: Option<i32>,
    result: String,
}

impl From<RawPlayer> for PlayerResult {
    fn from(p: RawPlayer) -> Self {
        PlayerResult {
            username: p.username,
            rating: p.rating,
            result: p.result,
        }
    }
}

impl From<RawGame> for MonthlyGame {
    fn from(g: RawGame) -> Self {
        MonthlyGame {
            pgn: g.pgn,
            url: g.url,
            time_class: g.time_class,
            end_time: g.end_time,
            white: g.white.into(),
            black: g.black.into(),
        }
    }
}

pub struct ReqwestChessServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestChessServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        ReqwestChessServiceClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for ReqwestChessServiceClient {
    fn default() -> Self {
        Self::new("https://api.chess.com")
    }
}

#[async_trait]
impl ChessServiceClient for ReqwestChessServiceClient {
    async fn fetch_archives(&self, _scope: &JobScope, username: &str) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/pub/player/{}/games/archives", self.base_url, username);
        let body: ArchivesResponse = self.http.get(&url).send().await?.json().await?;
        Ok(body.archives)
    }

    async fn fetch_monthly(&self, _scope: &JobScope, archive_url: &str) -> Result<Vec<MonthlyGame>, ClientError> {
        let body: MonthlyResponse = self.http.get(archive_url).send().await?.json().await?;
        Ok(body.games.into_iter().map(MonthlyGame::from).collect())
    }
}
