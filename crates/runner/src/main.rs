use argus_gateway::ReplayFeed;
use argus_runner::{
    EngineEvent, ForensicEvent, ForensicsEngine, SyntheticConfig, SyntheticFeed, load_config,
    load_default_config,
};
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

fn print_help() {
    eprintln!(
        r#"Argus - real-time market forensics engine

USAGE:
    argus [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --replay <FILE>     Replay a recorded session (one Binance stream message per line)
    --synthetic <N>     Run over N generated messages (default: 5000)
    --seed <SEED>       Seed for the synthetic feed
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (default: info)

EXAMPLES:
    # Synthetic run with the embedded configuration
    argus

    # Replay a capture with a custom configuration
    argus --config forensics.json --replay capture.jsonl
"#
    );
}

enum Source {
    Replay(String),
    Synthetic(usize),
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    match args.get(i).map(|v| v.parse::<T>()) {
        Some(Ok(value)) => value,
        _ => {
            eprintln!("Error: {} requires a valid argument", flag);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut source = Source::Synthetic(5_000);
    let mut seed: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                config_path = Some(parse_value(&args, i, "--config"));
            }
            "--replay" | "-r" => {
                i += 1;
                source = Source::Replay(parse_value(&args, i, "--replay"));
            }
            "--synthetic" | "-s" => {
                i += 1;
                source = Source::Synthetic(parse_value(&args, i, "--synthetic"));
            }
            "--seed" => {
                i += 1;
                seed = Some(parse_value(&args, i, "--seed"));
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            load_config(&path)?
        }
        None => {
            info!("Using embedded configuration");
            load_default_config()?
        }
    };

    let instruments = config.instruments.clone();
    let engine = ForensicsEngine::new(config)?;
    let listener = tokio::spawn(watch(engine.events()));
    engine.start()?;

    let summary = match source {
        Source::Replay(path) => {
            info!("Replaying {}", path);
            let mut feed = ReplayFeed::open(&path).await?;
            engine.run_feed(&mut feed).await?
        }
        Source::Synthetic(messages) => {
            let config = SyntheticConfig {
                instruments: if instruments.is_empty() {
                    SyntheticConfig::default().instruments
                } else {
                    instruments
                },
                ..SyntheticConfig::default()
            };
            info!("Generating {} synthetic messages", messages);
            let mut feed = match seed {
                Some(seed) => SyntheticFeed::with_seed(config, messages, seed),
                None => SyntheticFeed::new(config, messages),
            };
            engine.run_feed(&mut feed).await?
        }
    };

    let reports = engine.shutdown().await;
    let telemetry = engine.telemetry();
    drop(engine);
    let alerts = listener.await.unwrap_or(0);

    info!(
        "Processed {} messages ({} rejected, {} untracked), {} packets, {} ring drops, {} dispatch drops, {} critical alerts",
        summary.accepted,
        summary.rejected,
        summary.skipped,
        telemetry.total_packets,
        telemetry.ring_dropped,
        telemetry.dispatch_dropped,
        alerts
    );
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

/// Log absorption and critical verdicts as they happen; returns the
/// number of critical alerts seen.
async fn watch(mut events: tokio::sync::broadcast::Receiver<EngineEvent>) -> u64 {
    let mut alerts = 0;
    loop {
        match events.recv().await {
            Ok(EngineEvent { instrument, event, .. }) => match event {
                ForensicEvent::Absorption(signal) => info!(
                    "{} {:?} at {} absorbed {:.4}",
                    instrument, signal.signal_type, signal.price, signal.volume_absorbed
                ),
                ForensicEvent::Verdict(verdict) if verdict.is_critical_alert => {
                    alerts += 1;
                    warn!(
                        "{} critical: {:?}, conviction {}",
                        instrument, verdict.market_mode, verdict.conviction_score
                    );
                }
                _ => {}
            },
            Err(RecvError::Lagged(skipped)) => warn!("Event listener lagged by {}", skipped),
            Err(RecvError::Closed) => break,
        }
    }
    alerts
}
