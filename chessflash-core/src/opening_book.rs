//! A small curated ECO opening book. Not exhaustive — it covers the openings
//! common enough to show up in casual online play — matched against the
//! longest SAN move prefix it recognizes.

struct Entry {
    moves: &'static [&'static str],
    eco: &'static str,
    name: &'static str,
}

const BOOK: &[Entry] = &[
    Entry { moves: &["e4", "e5", "Nf3", "Nc6", "Bb5"], eco: "C60", name: "Ruy Lopez" },
    Entry { moves: &["e4", "e5", "Nf3", "Nc6", "Bc4"], eco: "C50", name: "Italian Game" },
    Entry { moves: &["e4", "e5", "Nf3", "Nc6"], eco: "C44", name: "King's Knight Opening" },
    Entry { moves: &["e4", "e5"], eco: "C20", name: "King's Pawn Game" },
    Entry { moves: &["e4", "c5"], eco: "B20", name: "Sicilian Defense" },
    Entry { moves: &["e4", "e6"], eco: "C00", name: "French Defense" },
    Entry { moves: &["e4", "c6"], eco: "B10", name: "Caro-Kann Defense" },
    Entry { moves: &["d4", "d5", "c4", "e6"], eco: "D30", name: "Queen's Gambit Declined" },
    Entry { moves: &["d4", "d5", "c4"], eco: "D06", name: "Queen's Gambit" },
    Entry { moves: &["d4", "Nf6", "c4", "g6"], eco: "E60", name: "King's Indian Defense" },
    Entry { moves: &["d4", "Nf6"], eco: "A45", name: "Indian Defense" },
    Entry { moves: &["d4", "d5"], eco: "D00", name: "Queen's Pawn Game" },
    Entry { moves: &["Nf3", "d5"], eco: "A06", name: "Reti Opening" },
    Entry { moves: &["c4"], eco: "A10", name: "English Opening" },
];

/// Finds the opening with the longest recognized move-prefix match, if any.
pub fn lookup(moves: &[String]) -> Option<(&'static str, &'static str)> {
    BOOK.iter()
        .filter(|e| {
            moves.len() >= e.moves.len()
                && moves[..e.moves.len()].iter().zip(e.moves.iter()).all(|(a, b)| a == b)
        })
        .max_by_key(|e| e.moves.len())
        .map(|e| (e.eco, e.name))
}
