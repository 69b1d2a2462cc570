//! PGN parsing helpers: header extraction, result normalization, archive URL
//! parsing, and movetext replay into a sequence of FEN positions.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{Chess, EnPassantMode, Position};

use crate::domain::GameResult;
use crate::error::PgnError;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).unwrap());
static EXTERNAL_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/game/[^/]+/(\d+)").unwrap());

/// Extracts `[Tag "Value"]` header pairs from a PGN's header section.
pub fn parse_headers(pgn: &str) -> HashMap<String, String> {
    HEADER_RE
        .captures_iter(pgn)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// Maps a chess.com-style result string onto the normalized three-way result.
/// Idempotent: normalizing an already-normalized `GameResult::as_str()` yields
/// the same variant back.
pub fn normalize_result(raw: &str) -> GameResult {
    match raw.to_lowercase().as_str() {
        "win" => GameResult::Win,
        "stalemate" | "agreed" | "repetition" | "insufficient" | "timevsinsufficient" | "50move"
        | "draw" => GameResult::Draw,
        _ => GameResult::Loss,
    }
}

/// Splits the last two path segments of an archive URL into `(year, month)`.
pub fn parse_archive_date(url: &str) -> Option<(i32, u32)> {
    let trimmed = url.trim_end_matches('/');
    let mut parts = trimmed.rsplit('/');
    let month: u32 = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    Some((year, month))
}

/// Extracts the numeric game id chess.com embeds in a game URL, falling back
/// to the whole URL when the expected shape isn't present.
pub fn extract_external_id(url: &str) -> String {
    EXTERNAL_ID_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| url.to_string())
}

fn strip_headers(pgn: &str) -> String {
    pgn.lines()
        .filter(|line| !line.trim_start().starts_with('['))
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_comments(movetext: &str) -> String {
    let mut out = String::with_capacity(movetext.len());
    let mut depth = 0u32;
    for ch in movetext.chars() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

const RESULT_TOKENS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

fn tokenize_movetext(movetext: &str) -> Vec<String> {
    movetext
        .split_whitespace()
        .filter(|tok| !tok.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) || !tok.contains('.'))
        .filter(|tok| !RESULT_TOKENS.contains(tok))
        .map(|tok| tok.trim_matches(|c: char| c == '!' || c == '?').to_string())
        .filter(|tok| !tok.is_empty())
        .collect()
}

fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Replays a game's movetext move by move, returning the FEN before each ply
/// (length `moves.len() + 1`) alongside the SAN tokens played. A position
/// count shorter than the header's move count is tolerated by callers via
/// `min(n, positions.len() - 1)`; an illegal or malformed move is fatal.
pub fn replay_positions(pgn: &str) -> Result<(Vec<String>, Vec<String>), PgnError> {
    let movetext = strip_comments(&strip_headers(pgn));
    let tokens = tokenize_movetext(&movetext);

    let mut pos = Chess::default();
    let mut positions = vec![fen_of(&pos)];
    let mut moves = Vec::with_capacity(tokens.len());

    for (i, token) in tokens.into_iter().enumerate() {
        let san: San = token
            .parse()
            .map_err(|_| PgnError::Unparseable(i, token.clone()))?;
        let mv = san
            .to_move(&pos)
            .map_err(|_| PgnError::Unparseable(i, token.clone()))?;
        pos = pos
            .play(mv)
            .map_err(|_| PgnError::Unparseable(i, token.clone()))?;
        moves.push(token);
        positions.push(fen_of(&pos));
    }

    Ok((positions, moves))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers() {
        let pgn = "[Event \"Live Chess\"]\n[ECO \"C50\"]\n\n1. e4 e5 2. Bc4 *";
        let headers = parse_headers(pgn);
        assert_eq!(headers.get("Event").unwrap(), "Live Chess");
        assert_eq!(headers.get("ECO").unwrap(), "C50");
    }

    #[test]
    fn normalizes_known_results() {
        assert_eq!(normalize_result("win"), GameResult::Win);
        assert_eq!(normalize_result("checkmated"), GameResult::Loss);
        assert_eq!(normalize_result("agreed"), GameResult::Draw);
        assert_eq!(normalize_result("timeout"), GameResult::Loss);
    }

    #[test]
    fn normalization_is_idempotent() {
        for result in [GameResult::Win, GameResult::Draw, GameResult::Loss] {
            assert_eq!(normalize_result(result.as_str()), result);
        }
    }

    #[test]
    fn parses_archive_date() {
        assert_eq!(
            parse_archive_date("https://api.chess.com/pub/player/foo/games/2024/03"),
            Some((2024, 3))
        );
        assert_eq!(parse_archive_date("not-a-url"), None);
    }

    #[test]
    fn extracts_external_id() {
        let url = "https://www.chess.com/game/live/123456789";
        assert_eq!(extract_external_id(url), "123456789");
    }

    #[test]
    fn replays_a_short_game() {
        let pgn = "[Event \"Test\"]\n\n1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7# 1-0";
        let (positions, moves) = replay_positions(pgn).unwrap();
        assert_eq!(moves.len(), 7);
        assert_eq!(positions.len(), 8);
        assert!(positions[0].starts_with("rnbqkbnr/pppppppp"));
    }

    #[test]
    fn rejects_illegal_movetext() {
        let pgn = "1. e4 e5 2. Qxq9 *";
        assert!(replay_positions(pgn).is_err());
    }
}
