use qnet::{
    MemoryConfig, MemoryKey, NodeId, ObserverRole, Process, QnetResult, QuantumRuntime,
    RecordingNode, RecordingObserver, Timeline, VirtualTime,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SEED: u64 = 42;
const NUM_MEMORIES: usize = 8;
const NUM_EXCITES: u64 = 200;

fn main() {
    init_logging("warn");

    println!("═══════════════════════════════════════════════════════");
    println!("  qnet: Quantum Memory Simulation Kernel");
    println!("  Decay, Emission + Replay Verification Demo");
    println!("═══════════════════════════════════════════════════════");
    println!();

    let (hash_1, hash_2) = match (run_simulation("Run 1"), run_simulation("Run 2")) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("  ✗ simulation failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("  Verification:");
    println!("    Run 1 log hash: {:016x}", hash_1);
    println!("    Run 2 log hash: {:016x}", hash_2);
    if hash_1 == hash_2 {
        println!("    ✓ Logs are IDENTICAL, deterministic replay confirmed.");
    } else {
        println!("    ✗ MISMATCH, determinism violation detected!");
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

fn run_simulation(label: &str) -> QnetResult<u64> {
    let mut tl = Timeline::with_seed(SEED);
    tl.enable_logging_with_checkpoints(50);
    tl.stop_at(VirtualTime::from_secs_f64(20e-6));

    let mut rt = QuantumRuntime::new();
    let node = NodeId::new(0);
    rt.register_node(node, Box::new(RecordingNode::new(node)));

    let config = MemoryConfig::default()
        .with_efficiency(0.9)
        .with_coherence_time(2e-6);
    let array = rt.build_array("node0.memory", NUM_MEMORIES, config)?;
    rt.bind_array(array, node)?;

    // Memory 0 is managed by a protocol that retries after each loss.
    let protocol = rt.register_observer(Box::new(RecordingObserver::rearming(
        ObserverRole::Protocol,
        1_000,
    )));
    rt.attach(MemoryKey::new(array, 0), protocol)?;

    for index in 0..NUM_MEMORIES {
        let memory = MemoryKey::new(array, index);
        tl.schedule(VirtualTime::ZERO, Process::MemorySetPlus { memory })?;
        tl.schedule(VirtualTime::ZERO, Process::MemoryArm { memory })?;
    }
    for i in 0..NUM_EXCITES {
        let memory = MemoryKey::new(array, (i as usize) % NUM_MEMORIES);
        tl.schedule(VirtualTime::new(i * 50_000), Process::MemoryExcite { memory })?;
    }

    let processed = tl.run(&mut rt);
    let log = tl.event_log()?;

    println!(
        "  {}: {} events, {} skipped, {} logged, {} checkpoints",
        label,
        processed,
        tl.events_skipped(),
        log.len(),
        log.checkpoints().len()
    );
    if let Some(recorder) = rt.node::<RecordingNode>(node) {
        println!(
            "    photons: {} ({} null), forwarded expirations: {}",
            recorder.photons.len(),
            recorder.null_count(),
            recorder.expired.len()
        );
    }
    if let Some(observer) = rt.observer::<RecordingObserver>(protocol) {
        println!("    protocol expirations: {}", observer.expired.len());
    }
    println!();

    Ok(log.log_hash())
}
