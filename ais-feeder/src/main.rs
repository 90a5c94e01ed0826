//! ais-feeder: Stream binary for AIS NMEA ingestion.
//!
//! Supports:
//! - Decoding recorded NMEA files (or stdin) into JSON records
//! - Following a live NMEA-over-TCP feed, reconnecting when it drops
//!
//! Every decoded message is written to stdout as one JSON line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use ais_core::config::{self, Config};
use ais_core::{now_ms, KnownStations, LineOutcome, Pipeline, PipelineStats};

mod source;

use source::{clean_line, open_lines, LineBuffer};

#[derive(Parser)]
#[command(name = "ais-feeder", version, about = "AIS NMEA ingestion")]
struct Cli {
    /// Config file (defaults to ~/.ais-decode/config.yaml)
    #[arg(long, global = true, env = "AIS_CONFIG")]
    config: Option<PathBuf>,

    /// Drop sentences with a bad NMEA checksum
    #[arg(long, global = true)]
    verify_checksum: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a file of NMEA sentences (`-` for stdin)
    Read {
        file: PathBuf,
    },
    /// Follow a live NMEA-over-TCP feed
    Listen {
        /// Feed host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Feed port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Seconds to wait before reconnecting
        #[arg(long)]
        reconnect_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .compact()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => match config::load_config_from(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => config::load_config(),
    };
    if cli.verify_checksum {
        cfg.pipeline.verify_checksum = true;
    }

    let mut pipeline = Pipeline::new(cfg.known_stations(), cfg.pipeline_options());

    let result = match cli.command {
        Commands::Read { file } => cmd_read(&mut pipeline, file),
        Commands::Listen {
            host,
            port,
            reconnect_secs,
        } => {
            if let Some(h) = host {
                cfg.feed.host = h;
            }
            if let Some(p) = port {
                cfg.feed.port = p;
            }
            if let Some(s) = reconnect_secs {
                cfg.feed.reconnect_secs = s;
            }
            cmd_listen(&mut pipeline, &cfg).await
        }
    };

    print_summary(pipeline.stats());

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_read(pipeline: &mut Pipeline<KnownStations>, file: PathBuf) -> io::Result<()> {
    let reader = open_lines(&file)?;
    eprintln!("Reading: {}", file.display());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in reader.lines() {
        let line = line?;
        if let Some(line) = clean_line(&line) {
            handle_line(pipeline, line, &mut out)?;
        }
    }
    out.flush()
}

async fn cmd_listen(pipeline: &mut Pipeline<KnownStations>, cfg: &Config) -> io::Result<()> {
    let addr = format!("{}:{}", cfg.feed.host, cfg.feed.port);
    let backoff = Duration::from_secs(cfg.feed.reconnect_secs.max(1));

    loop {
        tokio::select! {
            result = follow(pipeline, &addr) => {
                match result {
                    Ok(()) => warn!(%addr, "feed closed"),
                    Err(e) => warn!(%addr, error = %e, "feed error"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        }

        info!(secs = backoff.as_secs(), "reconnecting");
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        }
    }
}

/// Read one TCP connection until it closes.
async fn follow(pipeline: &mut Pipeline<KnownStations>, addr: &str) -> io::Result<()> {
    let mut stream = tokio::time::timeout(Duration::from_secs(10), TcpStream::connect(addr))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
    info!(%addr, "connected");

    let mut lines = LineBuffer::new();
    let mut chunk = vec![0u8; 4096];
    let stdout = io::stdout();

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if let Some(line) = lines.finish() {
                if let Some(line) = clean_line(&line) {
                    handle_line(pipeline, line, &mut stdout.lock())?;
                }
            }
            return Ok(());
        }
        let mut out = stdout.lock();
        for line in lines.push(&chunk[..n]) {
            if let Some(line) = clean_line(&line) {
                handle_line(pipeline, line, &mut out)?;
            }
        }
        out.flush()?;
        let fresh = lines.take_dropped();
        if fresh > 0 {
            debug!(fresh, total = lines.dropped, "overlong lines dropped");
        }
    }
}

fn handle_line<W: Write>(
    pipeline: &mut Pipeline<KnownStations>,
    line: &str,
    out: &mut W,
) -> io::Result<()> {
    if let LineOutcome::Record(record) = pipeline.process_line(line, now_ms()) {
        let json = serde_json::to_string(&record).map_err(io::Error::other)?;
        writeln!(out, "{json}")?;
    }
    Ok(())
}

fn print_summary(stats: &PipelineStats) {
    eprintln!(
        "{} lines, {} decoded ({} position A, {} position B, {} voyage, {} static), \
         {} dropped, {} unsupported, {} ignored",
        stats.lines,
        stats.decoded,
        stats.position_a,
        stats.position_b,
        stats.static_voyage,
        stats.static_report,
        stats.dropped(),
        stats.unsupported,
        stats.ignored,
    );
    if stats.checksum_mismatches > 0 || stats.fragments_discarded > 0 || stats.truncated > 0 {
        eprintln!(
            "{} checksum mismatches, {} fragments discarded, {} truncated records",
            stats.checksum_mismatches, stats.fragments_discarded, stats.truncated
        );
    }
}
