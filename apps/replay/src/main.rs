//! # rapidscan-replay
//!
//! Replays a recorded decoder capture through the scan pipeline.
//!
//! ## Usage
//! ```text
//! rapidscan-replay capture.jsonl
//! rapidscan-replay capture.jsonl --ack-latency-ms 40 --json
//! RUST_LOG=rapidscan=trace rapidscan-replay capture.jsonl --config scanner.toml
//! ```
//!
//! ## Replay Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for frame in capture:                                                  │
//! │      sleep(after_ms)                                                    │
//! │      SimulatedSource::capture(frame)   (nothing while in standby)       │
//! │                                                                         │
//! │  drain: wait for the deduplicator to return to Idle                     │
//! │  shutdown, then print the cart                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod capture;
mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use rapidscan_pipeline::{
    AckBehavior, DedupPhase, ScanPipeline, ScannerConfig, SimulatedSource,
};

use crate::capture::parse_capture;
use crate::report::{ReplayReport, ReplayStats};

/// Upper bound on waiting for the last debounce cycle to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(
    name = "rapidscan-replay",
    version,
    about = "Replay a barcode decoder capture through the scan pipeline"
)]
struct Args {
    /// Capture file (JSON Lines, one frame per line)
    capture: PathBuf,

    /// Scanner config file (defaults to the platform config path)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulated device latency for mode changes (0 acknowledges at once)
    #[arg(long, default_value_t = 0)]
    ack_latency_ms: u64,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ScannerConfig::load(Some(path.clone()))
            .with_context(|| format!("loading {}", path.display()))?,
        None => ScannerConfig::load_or_default(None),
    };

    let contents = std::fs::read_to_string(&args.capture)
        .with_context(|| format!("reading {}", args.capture.display()))?;
    let frames = parse_capture(&contents)?;
    info!(frames = frames.len(), capture = %args.capture.display(), "Capture loaded");

    let behavior = match args.ack_latency_ms {
        0 => AckBehavior::Immediate,
        ms => AckBehavior::After(Duration::from_millis(ms)),
    };
    let source = Arc::new(SimulatedSource::new(behavior));
    let pipeline = ScanPipeline::start(&config, source.clone())?;
    source.attach(pipeline.feed());

    // Tally decisions until the pipeline is dropped
    let mut decisions = pipeline.deduplicator().subscribe();
    let tally = tokio::spawn(async move {
        let mut stats = ReplayStats::default();
        loop {
            match decisions.recv().await {
                Ok(notification) => stats.record(&notification),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Replay tally fell behind");
                    stats.missed_notifications += missed;
                }
                Err(RecvError::Closed) => break,
            }
        }
        stats
    });

    let mut frames_in_standby = 0;
    for captured in &frames {
        tokio::time::sleep(captured.after).await;
        if !source.capture(captured.frame.clone()) {
            frames_in_standby += 1;
        }
    }

    drain(&pipeline).await;
    pipeline.shutdown().await?;

    let cart = pipeline.cart().clone();
    drop(pipeline);
    let mut stats = tally.await.context("tally task failed")?;
    stats.frames = frames.len();
    stats.frames_in_standby = frames_in_standby;

    let report = ReplayReport {
        stats,
        cart: cart.snapshot(),
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_table());
    }

    Ok(())
}

/// Waits until queued frames are handled and any debounce cycle is over.
async fn drain(pipeline: &ScanPipeline) {
    let dedup = pipeline.deduplicator();
    if let Err(e) = dedup.snapshot().await {
        warn!(error = %e, "Deduplicator stopped before drain");
        return;
    }

    let mut state = dedup.watch_state();
    match tokio::time::timeout(DRAIN_TIMEOUT, state.wait_for(|s| s.phase == DedupPhase::Idle)).await
    {
        Ok(Ok(_)) => debug!("Pipeline drained"),
        Ok(Err(_)) => warn!("Deduplicator state channel closed during drain"),
        Err(_) => warn!(phase = %dedup.state().phase, "Pipeline did not settle before shutdown"),
    };
}

/// Initializes the tracing subscriber. Logs go to stderr so `--json` output
/// stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rapidscan=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
