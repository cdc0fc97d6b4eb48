use plastinet::config::NetworkConfig;
use plastinet::network::Network;
use plastinet::observer::NetworkAdapter;

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }
    if args.len() >= 2 && args[1] == "engrams" {
        run_engram_demo();
        return;
    }

    if args.len() >= 2 {
        eprintln!("Unknown command: {}", args[1]);
        print_help();
        std::process::exit(2);
    }

    // Minimal demo:
    // - two input patterns, each with its own target
    // - error-modulated plasticity pulls the motor layer toward the targets
    // - competition prunes what the patterns never use
    let cfg = NetworkConfig::default()
        .with_seed(7)
        .with_predictive_mode(true)
        .with_resource_competition(true);
    let mut net = match Network::with_config(&[4, 8, 6, 2], 0.6, cfg) {
        Ok(net) => net,
        Err(e) => {
            eprintln!("failed to build network: {e}");
            std::process::exit(1);
        }
    };

    let patterns: [([f32; 4], [f32; 2]); 2] = [
        ([1.0, 1.0, 0.0, 0.0], [1.0, -1.0]),
        ([0.0, 0.0, 1.0, 1.0], [-1.0, 1.0]),
    ];

    for epoch in 0..40 {
        let mut err = 0.0;
        for (x, y) in &patterns {
            match net.train(x, y, 5) {
                Ok(report) => err += report.final_error,
                Err(e) => {
                    eprintln!("train failed: {e}");
                    std::process::exit(1);
                }
            }
        }

        if epoch % 5 == 0 {
            let d = net.diagnostics();
            println!(
                "epoch={epoch:3} clock={:5} err={:.3}  synapses={} inhibitory={} mean|w|={:.3} pruned={} pred_err={:?}",
                net.clock(),
                err / patterns.len() as f32,
                d.synapse_count,
                d.inhibitory_synapses,
                d.mean_abs_weight,
                d.pruned_last_round,
                net.prediction_errors(),
            );
        }
    }

    for (x, y) in &patterns {
        net.reset_transient();
        let mut out = Vec::new();
        // Activity advances one layer per call.
        for _ in 0..3 {
            out = net.process(x).unwrap_or_default();
        }
        println!("input={x:?} target={y:?} output={out:?}");
    }
}

fn print_help() {
    println!("plastinet (plastic network prototype)");
    println!("usage:");
    println!("  cargo run");
    println!("  cargo run -- engrams");
    println!("  cargo run -- --help");
    println!();
    println!("logging is controlled by RUST_LOG (e.g. RUST_LOG=debug)");
}

fn run_engram_demo() {
    let cfg = NetworkConfig::default()
        .with_seed(11)
        .with_engram_detection(true);
    let mut net = match Network::with_config(&[6, 10, 4], 0.7, cfg) {
        Ok(net) => net,
        Err(e) => {
            eprintln!("failed to build network: {e}");
            std::process::exit(1);
        }
    };

    let stimuli = [
        [1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
    ];
    for t in 0..120 {
        let x = &stimuli[(t / 20) % 2];
        if let Err(e) = net.process(x) {
            eprintln!("process failed: {e}");
            std::process::exit(1);
        }
    }

    let adapter = NetworkAdapter::new(&net);
    println!("engrams after waking phase: {}", net.engram_count());
    for e in adapter.top_engrams(5) {
        println!(
            "  {:<22} size={:2} strength={:.2} relevance={:.2} activations={}",
            e.id, e.size, e.strength, e.relevance, e.activation_count
        );
    }

    let summary = net
        .start_consolidation()
        .and_then(|_| net.consolidate())
        .and_then(|s| net.end_consolidation().map(|_| s));
    match summary {
        Ok(s) => println!(
            "consolidation: boosted={} decayed={} removed={} synapses +{} -{}",
            s.engrams.boosted,
            s.engrams.decayed,
            s.engrams.removed,
            s.synapses_boosted,
            s.synapses_weakened
        ),
        Err(e) => eprintln!("consolidation failed: {e}"),
    }
    println!("engrams after consolidation: {}", net.engram_count());
}
