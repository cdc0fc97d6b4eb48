//! Tic-tac-toe rules.
//!
//! Cells are indexed row-major, 0..9. X always moves first.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const CELLS: usize = 9;

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn other(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Board {
    cells: [Option<Mark>; CELLS],
    to_move: Mark,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [None; CELLS],
            to_move: Mark::X,
        }
    }

    /// Parse 9 characters (`X`, `O`, `.`), row-major. Side to move is inferred.
    pub fn parse(s: &str) -> Option<Self> {
        let chars: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
        if chars.len() != CELLS {
            return None;
        }
        let mut cells = [None; CELLS];
        for (cell, c) in cells.iter_mut().zip(chars) {
            *cell = match c {
                'X' | 'x' => Some(Mark::X),
                'O' | 'o' => Some(Mark::O),
                '.' | '-' | '_' => None,
                _ => return None,
            };
        }
        let xs = cells.iter().filter(|c| **c == Some(Mark::X)).count();
        let os = cells.iter().filter(|c| **c == Some(Mark::O)).count();
        let to_move = match xs.checked_sub(os) {
            Some(0) => Mark::X,
            Some(1) => Mark::O,
            _ => return None,
        };
        Some(Self { cells, to_move })
    }

    pub fn cell(&self, idx: usize) -> Option<Mark> {
        self.cells.get(idx).copied().flatten()
    }

    pub fn cells(&self) -> &[Option<Mark>; CELLS] {
        &self.cells
    }

    pub fn to_move(&self) -> Mark {
        self.to_move
    }

    pub fn is_legal(&self, idx: usize) -> bool {
        idx < CELLS && self.cells[idx].is_none() && !self.is_terminal()
    }

    pub fn legal_moves(&self) -> Vec<usize> {
        if self.winner().is_some() {
            return Vec::new();
        }
        (0..CELLS).filter(|&i| self.cells[i].is_none()).collect()
    }

    /// Place the side-to-move's mark. Returns `false` (and changes nothing) if illegal.
    pub fn apply(&mut self, idx: usize) -> bool {
        if !self.is_legal(idx) {
            return false;
        }
        self.cells[idx] = Some(self.to_move);
        self.to_move = self.to_move.other();
        true
    }

    /// Take back a move made with [`Self::apply`].
    pub fn undo(&mut self, idx: usize) -> bool {
        let last = self.to_move.other();
        if self.cells.get(idx).copied().flatten() != Some(last) {
            return false;
        }
        self.cells[idx] = None;
        self.to_move = last;
        true
    }

    pub fn winner(&self) -> Option<Mark> {
        LINES.iter().find_map(|&[a, b, c]| {
            let m = self.cells[a]?;
            (self.cells[b] == Some(m) && self.cells[c] == Some(m)).then_some(m)
        })
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn is_terminal(&self) -> bool {
        self.winner().is_some() || self.is_full()
    }

    /// Network input from `perspective`'s point of view: own 1, opponent -1, empty 0.
    pub fn encode_for(&self, perspective: Mark) -> [f32; CELLS] {
        let mut out = [0.0; CELLS];
        for (o, c) in out.iter_mut().zip(self.cells.iter()) {
            *o = match c {
                Some(m) if *m == perspective => 1.0,
                Some(_) => -1.0,
                None => 0.0,
            };
        }
        out
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..3 {
            for col in 0..3 {
                let c = match self.cells[row * 3 + col] {
                    Some(Mark::X) => 'X',
                    Some(Mark::O) => 'O',
                    None => '.',
                };
                write!(f, "{c}")?;
            }
            if row < 2 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Every non-terminal position reachable from the empty board, in a stable order.
pub fn reachable_positions() -> Vec<Board> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![Board::new()];
    while let Some(b) = stack.pop() {
        if b.is_terminal() || !seen.insert(b) {
            continue;
        }
        for m in b.legal_moves() {
            let mut next = b;
            next.apply(m);
            stack.push(next);
        }
    }
    seen.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_and_undo() {
        let mut b = Board::new();
        assert!(b.apply(4));
        assert_eq!(b.cell(4), Some(Mark::X));
        assert_eq!(b.to_move(), Mark::O);
        assert!(!b.apply(4));
        assert!(!b.undo(0));
        assert!(b.undo(4));
        assert_eq!(b, Board::new());
    }

    #[test]
    fn winner_and_terminal() {
        let b = Board::parse("XXX OO. ...").unwrap();
        assert_eq!(b.winner(), Some(Mark::X));
        assert!(b.is_terminal());
        assert!(b.legal_moves().is_empty());
        assert!(!b.is_legal(8));

        let draw = Board::parse("XOX XOO OXX").unwrap();
        assert_eq!(draw.winner(), None);
        assert!(draw.is_full());
    }

    #[test]
    fn parse_rejects_impossible_counts() {
        assert!(Board::parse("XX. ... ...").is_none());
        assert!(Board::parse("O.. ... ...").is_none());
        assert!(Board::parse("X..").is_none());
        assert_eq!(Board::parse("X.. ... ...").map(|b| b.to_move()), Some(Mark::O));
    }

    #[test]
    fn encoding_is_relative_to_perspective() {
        let b = Board::parse("X.. .O. ...").unwrap();
        let x = b.encode_for(Mark::X);
        let o = b.encode_for(Mark::O);
        assert_eq!(x[0], 1.0);
        assert_eq!(x[4], -1.0);
        assert_eq!(o[0], -1.0);
        assert_eq!(o[4], 1.0);
        assert_eq!(x[8], 0.0);
    }

    #[test]
    fn reachable_position_count() {
        // 5478 legal positions, 958 of them terminal.
        assert_eq!(reachable_positions().len(), 4520);
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let b = Board::parse("XO. .X. ..O").unwrap();
        assert_eq!(Board::parse(&b.to_string()), Some(b));
    }
}
