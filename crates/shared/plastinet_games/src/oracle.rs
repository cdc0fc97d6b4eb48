//! Perfect-play oracle: negamax with alpha-beta pruning.
//!
//! Scores are from the side to move: 1 win, 0 draw, -1 loss.

use crate::tic_tac_toe::{Board, CELLS};

/// Game-theoretic value of `board` for the side to move.
pub fn value(board: &Board) -> i8 {
    let mut b = *board;
    negamax(&mut b, -1, 1)
}

fn negamax(b: &mut Board, mut alpha: i8, beta: i8) -> i8 {
    if let Some(w) = b.winner() {
        // The previous mover completed a line.
        return if w == b.to_move() { 1 } else { -1 };
    }
    if b.is_full() {
        return 0;
    }

    let mut best = -1;
    for m in b.legal_moves() {
        b.apply(m);
        let score = -negamax(b, -beta, -alpha);
        b.undo(m);
        if score > best {
            best = score;
        }
        if best > alpha {
            alpha = best;
        }
        if alpha >= beta {
            break;
        }
    }
    best
}

/// Exact score of every legal move for the side to move; `None` for illegal cells.
pub fn move_scores(board: &Board) -> [Option<i8>; CELLS] {
    let mut out = [None; CELLS];
    let mut b = *board;
    for m in board.legal_moves() {
        b.apply(m);
        out[m] = Some(-negamax(&mut b, -1, 1));
        b.undo(m);
    }
    out
}

/// Legal moves sharing the best score, ascending.
pub fn best_moves(board: &Board) -> Vec<usize> {
    let scores = move_scores(board);
    let Some(best) = scores.iter().flatten().copied().max() else {
        return Vec::new();
    };
    (0..CELLS).filter(|&i| scores[i] == Some(best)).collect()
}

/// Training target: move score per cell, illegal cells -1.
pub fn target_vector(board: &Board) -> [f32; CELLS] {
    let mut out = [-1.0; CELLS];
    for (o, s) in out.iter_mut().zip(move_scores(board)) {
        if let Some(s) = s {
            *o = f32::from(s);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tic_tac_toe::Mark;

    #[test]
    fn empty_board_is_a_draw() {
        let b = Board::new();
        assert_eq!(value(&b), 0);
        assert!(move_scores(&b).iter().all(|s| *s == Some(0)));
    }

    #[test]
    fn takes_the_immediate_win() {
        // X to move, 2 completes the top row.
        let b = Board::parse("XX. OO. ...").unwrap();
        assert_eq!(b.to_move(), Mark::X);
        assert_eq!(value(&b), 1);
        assert_eq!(best_moves(&b), vec![2]);
    }

    #[test]
    fn must_block() {
        // O to move, X threatens 2.
        let b = Board::parse("XX. .O. ...").unwrap();
        assert_eq!(b.to_move(), Mark::O);
        let scores = move_scores(&b);
        assert_eq!(scores[2], Some(0));
        assert_eq!(scores[8], Some(-1));
        assert_eq!(scores[0], None);
        assert_eq!(best_moves(&b), vec![2]);
    }

    #[test]
    fn finished_game_values() {
        let won = Board::parse("XXX OO. ...").unwrap();
        assert_eq!(value(&won), -1);
        assert!(best_moves(&won).is_empty());
        let draw = Board::parse("XOX XOO OXX").unwrap();
        assert_eq!(value(&draw), 0);
    }

    #[test]
    fn target_marks_illegal_cells() {
        let b = Board::parse("XX. .O. ...").unwrap();
        let t = target_vector(&b);
        assert_eq!(t[0], -1.0);
        assert_eq!(t[2], 0.0);
        assert_eq!(t[6], -1.0);
    }
}
