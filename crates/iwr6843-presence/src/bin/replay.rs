//! Replay a raw IWR6843 capture through the presence engine.
//!
//! Streams the capture file through the decoder, boundary filter and track
//! manager exactly as live data would flow, and prints every published
//! update to stdout. Time is simulated: each poll advances the clock by
//! `--tick-ms`.
//!
//! Usage:
//!   cargo run -p iwr6843-presence --bin iwr6843-replay -- capture.bin --config driver.json

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use iwr6843_hardware::adapter::ReaderTransport;
use iwr6843_presence::{DriverConfig, Engine, OutputKind, OutputValue, SlotId};

#[derive(Parser)]
#[command(name = "iwr6843-replay", about = "Replay a recorded IWR6843 data stream")]
struct Cli {
    /// Raw capture of the sensor's data port.
    capture: PathBuf,

    /// JSON driver configuration; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bytes per transport read.
    #[arg(long, default_value_t = 1024)]
    chunk: usize,

    /// Simulated milliseconds per poll.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Publish the initial state of every output before replaying.
    #[arg(long)]
    initial_state: bool,
}

type Channel = Box<dyn FnMut(OutputValue)>;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DriverConfig::from_json(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DriverConfig::default(),
    };
    config.read_chunk_size = cli.chunk;

    let file = File::open(&cli.capture)
        .with_context(|| format!("opening capture {}", cli.capture.display()))?;
    let transport = ReaderTransport::new(BufReader::new(file));

    let slots = config.component.slots.clone();
    let mut engine: Engine<_, Channel> = Engine::new(config, transport)?;
    for declaration in &slots {
        let Some(id) = SlotId::new(declaration.id) else {
            continue;
        };
        for kind in OutputKind::ALL {
            let label = declaration.display_label();
            let channel: Channel =
                Box::new(move |value: OutputValue| println!("{label} {kind}: {value}"));
            engine.register_output(id, kind, channel)?;
        }
    }

    engine.setup()?;
    if cli.initial_state {
        engine.publish_initial_state();
    }

    let start = Instant::now();
    let tick = Duration::from_millis(cli.tick_ms);
    let mut polls: u32 = 0;
    loop {
        polls += 1;
        let now = start + tick * polls;
        let summary = engine.poll(now).context("reading capture")?;
        if summary.bytes_read == 0 && engine.transport().is_eof() {
            break;
        }
    }

    let stats = engine.stats();
    let decode = engine.decode_stats();
    tracing::info!(
        polls = stats.polls,
        frames = decode.frames_decoded,
        dropped = decode.frames_dropped,
        skipped_bytes = decode.bytes_skipped,
        corrupt_tlvs = decode.corrupt_tlvs,
        skipped_tlvs = decode.tlvs_skipped,
        published = engine.published_total(),
        "Replay finished"
    );
    Ok(())
}
