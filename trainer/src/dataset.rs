//! Oracle-labelled tic-tac-toe positions.

use plastinet::prng::Prng;
use plastinet_games::oracle;
use plastinet_games::tic_tac_toe::{reachable_positions, Board, CELLS};

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub board: Board,
    pub input: [f32; CELLS],
    pub target: [f32; CELLS],
}

impl Sample {
    pub fn label(board: Board) -> Self {
        Self {
            input: board.encode_for(board.to_move()),
            target: oracle::target_vector(&board),
            board,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    /// Every non-terminal reachable position, labelled.
    pub fn full() -> Self {
        let samples = reachable_positions().into_iter().map(Sample::label).collect();
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `n` samples drawn with replacement; `n == 0` returns all, in order.
    pub fn sample<'a>(&'a self, n: usize, rng: &mut Prng) -> Vec<&'a Sample> {
        if n == 0 || self.samples.is_empty() {
            return self.samples.iter().collect();
        }
        (0..n)
            .map(|_| &self.samples[rng.gen_range_usize(0, self.samples.len())])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_the_oracle() {
        let b = Board::parse("XX. OO. ...").unwrap();
        let s = Sample::label(b);
        assert_eq!(s.target[2], 1.0);
        assert_eq!(s.target[0], -1.0);
        assert_eq!(s.input[0], 1.0);
        assert_eq!(s.input[3], -1.0);
    }

    #[test]
    fn sampling_is_deterministic() {
        let ds = Dataset::full();
        assert_eq!(ds.len(), 4520);
        let a: Vec<Board> = ds.sample(50, &mut Prng::new(3)).iter().map(|s| s.board).collect();
        let b: Vec<Board> = ds.sample(50, &mut Prng::new(3)).iter().map(|s| s.board).collect();
        assert_eq!(a, b);
        assert_eq!(ds.sample(0, &mut Prng::new(3)).len(), ds.len());
    }
}
