mod config;
mod dataset;
mod error;
mod paths;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use plastinet::network::{Diagnostics, Network};
use plastinet::prng::Prng;
use plastinet_games::net_io;
use plastinet_games::oracle;
use plastinet_games::stats::GameStats;
use plastinet_games::tic_tac_toe::{Board, Mark};
use serde::Serialize;
use tracing::{debug, error, info};

use config::TrainerConfig;
use dataset::Dataset;
use error::{Result, TrainerError};
use paths::AppPaths;

/// Fixed seed for the per-epoch agreement check so epochs are comparable.
const AGREEMENT_SEED: u64 = 0xC0FFEE;
const AGREEMENT_POSITIONS: usize = 100;

#[derive(Debug, Serialize)]
struct RunReport {
    epochs: usize,
    mean_error: f32,
    oracle_agreement: f32,
    image_bytes: usize,
    diagnostics: Diagnostics,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("train") => run_train(&args[1..]),
        Some("eval") => run_eval(&args[1..]),
        Some("--help" | "-h" | "help") | None => {
            print_help();
            Ok(())
        }
        Some(other) => Err(TrainerError::Usage(format!("unknown command: {other}"))),
    };

    if let Err(e) = result {
        error!("{e}");
        if matches!(e, TrainerError::Usage(_)) {
            print_help();
        }
        std::process::exit(1);
    }
}

fn print_help() {
    println!("plastinet-trainer (tic-tac-toe training for the plastic network)");
    println!("usage:");
    println!("  plastinet-trainer train [--config PATH] [--out PATH]");
    println!("  plastinet-trainer eval [--config PATH] [--model PATH] [--games N]");
    println!();
    println!("logging is controlled by RUST_LOG (e.g. RUST_LOG=debug)");
}

/// Value following `flag`, if present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(i) => args
            .get(i + 1)
            .map(|v| Some(v.as_str()))
            .ok_or_else(|| TrainerError::Usage(format!("{flag} needs a value"))),
    }
}

/// `--config PATH`, else the config file in the data directory, else defaults.
fn resolve_config(args: &[String], paths: &AppPaths) -> Result<TrainerConfig> {
    match flag_value(args, "--config")? {
        Some(p) => TrainerConfig::load(Path::new(p)),
        None if paths.config_file().is_file() => TrainerConfig::load(&paths.config_file()),
        None => Ok(TrainerConfig::default()),
    }
}

fn run_train(args: &[String]) -> Result<()> {
    let paths = AppPaths::new()?;
    let cfg = resolve_config(args, &paths)?;
    let out = flag_value(args, "--out")?
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.model_file());

    let topology = net_io::topology(&cfg.hidden);
    let mut net = Network::with_config(&topology, cfg.density, cfg.network)?;
    let dataset = Dataset::full();
    info!(
        data_dir = %paths.data_dir().display(),
        ?topology,
        positions = dataset.len(),
        synapses = net.synapses().len(),
        "training started"
    );

    let mut rng = Prng::new(cfg.sample_seed);
    let mut mean_error = 0.0;
    let mut agreement = 0.0;
    for epoch in 1..=cfg.epochs {
        let batch = dataset.sample(cfg.positions_per_epoch, &mut rng);
        let mut total = 0.0;
        for s in &batch {
            net.reset_transient();
            total += net.train(&s.input, &s.target, cfg.iterations_per_position)?.final_error;
        }
        mean_error = total / batch.len().max(1) as f32;

        if net.is_resource_competition() {
            let report = net.run_competition();
            debug!(epoch, pruned = report.pruned, "competition round");
        }

        if cfg.consolidate_every > 0 && epoch % cfg.consolidate_every == 0 {
            net.start_consolidation()?;
            let summary = net.consolidate()?;
            net.end_consolidation()?;
            debug!(
                epoch,
                engrams_removed = summary.engrams.removed,
                synapses_boosted = summary.synapses_boosted,
                "consolidated"
            );
        }

        agreement = measure_agreement(&mut net, &dataset, AGREEMENT_POSITIONS)?.accuracy();
        let d = net.diagnostics();
        info!(
            epoch,
            mean_error,
            agreement,
            synapses = d.synapse_count,
            inhibitory = d.inhibitory_synapses,
            engrams = d.engram_count,
            "epoch done"
        );
    }

    let mut w = BufWriter::new(File::create(&out)?);
    net.save_image_to(&mut w)?;
    w.flush()?;
    let image_bytes = net.image_size_bytes()?;
    info!(path = %out.display(), image_bytes, "model saved");

    let report = RunReport {
        epochs: cfg.epochs,
        mean_error,
        oracle_agreement: agreement,
        image_bytes,
        diagnostics: net.diagnostics(),
    };
    std::fs::write(paths.report_file(), serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

fn measure_agreement(net: &mut Network, dataset: &Dataset, n: usize) -> Result<GameStats> {
    let mut rng = Prng::new(AGREEMENT_SEED);
    let mut stats = GameStats::new();
    for s in dataset.sample(n, &mut rng) {
        stats.record_trial(net_io::agrees_with_oracle(net, &s.board)?);
    }
    Ok(stats)
}

fn run_eval(args: &[String]) -> Result<()> {
    let paths = AppPaths::new()?;
    let cfg = resolve_config(args, &paths)?;
    let model = match flag_value(args, "--model")? {
        Some(p) => PathBuf::from(p),
        None => paths.model_file(),
    };
    let games = match flag_value(args, "--games")? {
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| TrainerError::Usage(format!("--games expects a number, got {v}")))?,
        None => 20,
    };
    if !model.is_file() {
        return Err(TrainerError::MissingModel(model));
    }

    let mut net = Network::load_image_from(&mut BufReader::new(File::open(&model)?))?;
    let dataset = Dataset::full();

    let mut rng = Prng::new(cfg.sample_seed);
    let mut stats = GameStats::new();
    for s in dataset.sample(cfg.eval_positions, &mut rng) {
        stats.record_trial(net_io::agrees_with_oracle(&mut net, &s.board)?);
    }
    info!(
        positions = stats.trials,
        accuracy = stats.accuracy(),
        learned_at = ?stats.learned_at_trial,
        "oracle agreement"
    );

    let (mut wins, mut draws, mut losses) = (0, 0, 0);
    for g in 0..games {
        let side = if g % 2 == 0 { Mark::X } else { Mark::O };
        match play_vs_oracle(&mut net, side, &mut rng)? {
            Some(m) if m == side => wins += 1,
            Some(_) => losses += 1,
            None => draws += 1,
        }
    }
    info!(games, wins, draws, losses, "games against the oracle");
    println!(
        "agreement={:.3} games={games} wins={wins} draws={draws} losses={losses}",
        stats.accuracy()
    );
    Ok(())
}

/// Play one game; the oracle picks uniformly among its best moves. Returns the winner.
fn play_vs_oracle(net: &mut Network, side: Mark, rng: &mut Prng) -> Result<Option<Mark>> {
    let mut board = Board::new();
    while !board.is_terminal() {
        let mv = if board.to_move() == side {
            net_io::choose_move(net, &board)?
        } else {
            let best = oracle::best_moves(&board);
            best.get(rng.gen_range_usize(0, best.len())).copied()
        };
        match mv {
            Some(m) if board.apply(m) => {}
            _ => break,
        }
    }
    Ok(board.winner())
}
