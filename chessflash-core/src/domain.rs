//! The data model shared by every component: games, positions, flashcards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    Win,
    Draw,
    Loss,
}

impl GameResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameResult::Win => "win",
            GameResult::Draw => "draw",
            GameResult::Loss => "loss",
        }
    }
}

/// Ordered worst-to-best so tests can compare classifications directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MoveClassification {
    Blunder,
    Mistake,
    Inaccuracy,
    Good,
    Best,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub profile_id: String,
    pub external_id: String,
    pub pgn: String,
    pub time_class: String,
    pub result: GameResult,
    pub played_as: Color,
    pub opponent: String,
    pub player_rating: Option<i32>,
    pub opponent_rating: Option<i32>,
    pub played_at: DateTime<Utc>,
    pub eco_code: Option<String>,
    pub opening_name: Option<String>,
    pub opening_url: Option<String>,
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub game_id: String,
    pub move_number: u32,
    pub fen_before: String,
    pub move_played: String,
    pub best_move: String,
    pub eval_before_cp: i32,
    pub eval_after_cp: i32,
    pub eval_delta: i32,
    pub mate_before: Option<i32>,
    pub mate_after: Option<i32>,
    pub classification: MoveClassification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub game_id: String,
    pub move_number: u32,
    pub due_at: DateTime<Utc>,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub times_reviewed: u32,
    pub times_correct: u32,
}

impl Flashcard {
    /// A freshly-gated flashcard: due immediately, SM-2's starting ease factor.
    pub fn new(game_id: String, move_number: u32, due_at: DateTime<Utc>) -> Self {
        Flashcard {
            game_id,
            move_number,
            due_at,
            interval_days: 0,
            ease_factor: 2.5,
            times_reviewed: 0,
            times_correct: 0,
        }
    }
}

/// Predicate describing which games a backfill/analysis sweep should pick up:
/// pending analysis, optionally scoped to one profile, bounded to a batch size.
#[derive(Debug, Clone, Default)]
pub struct PendingAnalysisFilter {
    pub profile_id: Option<String>,
    pub limit: usize,
}
