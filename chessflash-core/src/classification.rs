//! Turns a pair of engine evaluations into a stored `Position` row: the
//! centipawn delta, the mate indicators, and the move classification.

use crate::domain::{Color, MoveClassification};
use crate::engine::EngineEval;

pub struct MoveEvaluation {
    pub eval_before_cp: i32,
    pub eval_after_cp: i32,
    pub eval_delta: i32,
    pub mate_before: Option<i32>,
    pub mate_after: Option<i32>,
    pub classification: MoveClassification,
}

/// `mate` is reported from white's perspective; `true` means the side that
/// just moved (`mover`) is on the losing end of it.
fn mate_against_mover(mate: i32, mover: Color) -> bool {
    match mover {
        Color::White => mate < 0,
        Color::Black => mate > 0,
    }
}

/// Classify `mover`'s move from the evaluation just before and just after it
/// was played. Mate transitions dominate centipawn thresholds: a move that
/// hands the opponent a forced mate is always a blunder, and the inverse is
/// always best, regardless of the centipawn swing.
pub fn evaluate_move(mover: Color, before: &EngineEval, after: &EngineEval) -> MoveEvaluation {
    let eval_before_cp = if before.mate.is_some() { 0 } else { before.cp };
    let eval_after_cp = if after.mate.is_some() { 0 } else { after.cp };

    if let Some(mate) = after.mate {
        let classification = if mate_against_mover(mate, mover) {
            MoveClassification::Blunder
        } else {
            MoveClassification::Best
        };
        return MoveEvaluation {
            eval_before_cp,
            eval_after_cp,
            eval_delta: eval_after_cp - eval_before_cp,
            mate_before: before.mate,
            mate_after: after.mate,
            classification,
        };
    }

    let white_delta = after.cp - before.cp;
    let mover_delta = match mover {
        Color::White => white_delta,
        Color::Black => -white_delta,
    };
    let classification = match mover_delta {
        d if d <= -300 => MoveClassification::Blunder,
        d if d <= -150 => MoveClassification::Mistake,
        d if d <= -50 => MoveClassification::Inaccuracy,
        _ => MoveClassification::Good,
    };

    MoveEvaluation {
        eval_before_cp,
        eval_after_cp,
        eval_delta: mover_delta,
        mate_before: before.mate,
        mate_after: after.mate,
        classification,
    }
}
