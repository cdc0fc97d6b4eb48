//! Run tic-tac-toe positions through a `plastinet::network::Network`.
//!
//! A network used here must have 9 sensory and 9 motor neurons. Activity
//! advances one layer per `process` call, so a position is presented once per
//! layer transition before the motor layer is read.

#[cfg(feature = "plastinet")]
use plastinet::error::{NetworkError, Result};
#[cfg(feature = "plastinet")]
use plastinet::network::{Network, TrainReport};

#[cfg(feature = "plastinet")]
use crate::oracle;
#[cfg(feature = "plastinet")]
use crate::tic_tac_toe::{Board, CELLS};

/// Topology for a tic-tac-toe player with the given hidden layers.
pub fn topology(hidden: &[usize]) -> Vec<usize> {
    let mut t = Vec::with_capacity(hidden.len() + 2);
    t.push(9);
    t.extend_from_slice(hidden);
    t.push(9);
    t
}

#[cfg(feature = "plastinet")]
fn check_shape(net: &Network) -> Result<()> {
    let topo = net.topology();
    if topo.first() != Some(&CELLS) || topo.last() != Some(&CELLS) {
        return Err(NetworkError::InvalidArgument(format!(
            "tic-tac-toe needs 9 inputs and 9 outputs, got topology {topo:?}"
        )));
    }
    Ok(())
}

/// Motor outputs for `board`, from the side to move's perspective.
#[cfg(feature = "plastinet")]
pub fn move_values(net: &mut Network, board: &Board) -> Result<Vec<f32>> {
    check_shape(net)?;
    let x = board.encode_for(board.to_move());
    net.reset_transient();
    let mut out = Vec::new();
    for _ in 1..net.topology().len() {
        out = net.process(&x)?;
    }
    Ok(out)
}

/// Highest-valued legal cell; `None` on a finished board. Ties go to the lowest index.
#[cfg(feature = "plastinet")]
pub fn choose_move(net: &mut Network, board: &Board) -> Result<Option<usize>> {
    let values = move_values(net, board)?;
    let mut best: Option<(usize, f32)> = None;
    for m in board.legal_moves() {
        let v = values.get(m).copied().unwrap_or(f32::NEG_INFINITY);
        if best.map_or(true, |(_, bv)| v > bv) {
            best = Some((m, v));
        }
    }
    Ok(best.map(|(m, _)| m))
}

/// Train on one oracle-labelled position.
#[cfg(feature = "plastinet")]
pub fn train_position(net: &mut Network, board: &Board, iterations: usize) -> Result<TrainReport> {
    check_shape(net)?;
    let x = board.encode_for(board.to_move());
    let y = oracle::target_vector(board);
    net.reset_transient();
    net.train(&x, &y, iterations)
}

/// Whether the network's choice is one of the oracle's best moves.
#[cfg(feature = "plastinet")]
pub fn agrees_with_oracle(net: &mut Network, board: &Board) -> Result<bool> {
    let Some(m) = choose_move(net, board)? else {
        return Ok(false);
    };
    Ok(oracle::best_moves(board).contains(&m))
}

#[cfg(all(test, feature = "plastinet"))]
mod tests {
    use super::*;
    use plastinet::config::NetworkConfig;

    fn player(seed: u64) -> Network {
        let cfg = NetworkConfig::default().with_seed(seed);
        Network::with_config(&topology(&[12]), 0.8, cfg).unwrap()
    }

    #[test]
    fn chosen_move_is_always_legal() {
        let mut net = player(5);
        let b = Board::parse("XO. .X. ..O").unwrap();
        let m = choose_move(&mut net, &b).unwrap().unwrap();
        assert!(b.is_legal(m));

        let done = Board::parse("XXX OO. ...").unwrap();
        assert_eq!(choose_move(&mut net, &done).unwrap(), None);
    }

    #[test]
    fn rejects_wrong_shape() {
        let mut net = Network::new(&[9, 4, 3], 0.5).unwrap();
        let err = move_values(&mut net, &Board::new()).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidArgument(_)));
    }

    #[test]
    fn training_on_a_position_runs() {
        let mut net = player(9);
        let b = Board::parse("XX. .O. ...").unwrap();
        let report = train_position(&mut net, &b, 20).unwrap();
        assert_eq!(report.iterations, 20);
        assert!(report.final_error.is_finite());
        assert_eq!(net.clock(), 200);
        assert_eq!(move_values(&mut net, &b).unwrap().len(), 9);
    }
}
