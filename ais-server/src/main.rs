//! ais: CLI for AIS decoding and station tracking.

use std::collections::HashMap;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ais_core::config::{self, Config};
use ais_core::types::*;
use ais_core::{LineOutcome, Pipeline, PipelineStats};

mod db;

#[derive(Parser)]
#[command(name = "ais", version, about = "AIS NMEA decoder and station tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode NMEA sentences from a file and print a vessel table
    Decode {
        /// Path to file containing AIVDM/AIVDO sentences (`-` for stdin)
        file: PathBuf,

        /// Print each decoded message as JSON instead of the summary table
        #[arg(short, long)]
        raw: bool,

        /// Drop sentences with a bad NMEA checksum
        #[arg(long)]
        verify_checksum: bool,
    },

    /// Track stations from a capture file with database persistence
    Track {
        /// Path to file containing AIVDM/AIVDO sentences (`-` for stdin)
        file: PathBuf,

        /// SQLite database path (overrides config)
        #[arg(long)]
        db_path: Option<String>,

        /// Config file (defaults to ~/.ais-decode/config.yaml)
        #[arg(long, env = "AIS_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show database statistics
    Stats {
        /// SQLite database path
        #[arg(long, default_value = "data/ais.db")]
        db_path: String,
    },

    /// Show one station and its recent positions
    Station {
        /// Station MMSI (up to 9 digits)
        mmsi: String,

        /// SQLite database path
        #[arg(long, default_value = "data/ais.db")]
        db_path: String,

        /// Number of positions to list
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Delete stored positions older than the given age
    Prune {
        /// Maximum position age in hours
        #[arg(long, default_value_t = 24)]
        max_age_hours: i64,

        /// SQLite database path
        #[arg(long, default_value = "data/ais.db")]
        db_path: String,
    },

    /// Write the default config to ~/.ais-decode/config.yaml
    InitConfig {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Accumulated vessel state from decoded messages.
struct VesselState {
    mmsi: Mmsi,
    shipname: Option<String>,
    callsign: Option<String>,
    shiptype: Option<u8>,
    destination: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    speed_kts: Option<f64>,
    course_deg: Option<f64>,
    heading: Option<u16>,
    class_b: bool,
    messages: u32,
}

impl VesselState {
    fn new(mmsi: Mmsi) -> Self {
        VesselState {
            mmsi,
            shipname: None,
            callsign: None,
            shiptype: None,
            destination: None,
            lat: None,
            lon: None,
            speed_kts: None,
            course_deg: None,
            heading: None,
            class_b: false,
            messages: 0,
        }
    }

    fn update(&mut self, msg: &DecodedMessage) {
        self.messages += 1;
        if let Some((lat, lon)) = msg.position() {
            self.lat = Some(lat);
            self.lon = Some(lon);
        }
        match msg {
            DecodedMessage::PositionReportA(m) => {
                self.speed_kts = m.speed();
                self.course_deg = m.course();
                self.heading = m.true_heading();
            }
            DecodedMessage::PositionReportB(m) => {
                self.class_b = true;
                self.speed_kts = m.speed();
                self.course_deg = m.course();
                self.heading = m.true_heading();
            }
            DecodedMessage::StaticVoyageData(m) => {
                set_text(&mut self.shipname, &m.shipname);
                set_text(&mut self.callsign, &m.callsign);
                set_text(&mut self.destination, &m.destination);
                if m.shiptype != 0 {
                    self.shiptype = Some(m.shiptype);
                }
            }
            DecodedMessage::StaticDataReport(m) => {
                self.class_b = true;
                match &m.part {
                    StaticDataPart::A(a) => set_text(&mut self.shipname, &a.shipname),
                    StaticDataPart::B(b) => {
                        set_text(&mut self.callsign, &b.callsign);
                        if b.shiptype != 0 {
                            self.shiptype = Some(b.shiptype);
                        }
                    }
                }
            }
        }
    }
}

fn set_text(slot: &mut Option<String>, value: &str) {
    if !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

fn main() {
    tracing_subscriber::fmt()
        .compact()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            file,
            raw,
            verify_checksum,
        } => cmd_decode(file, raw, verify_checksum),
        Commands::Track {
            file,
            db_path,
            config,
        } => cmd_track(file, db_path, config),
        Commands::Stats { db_path } => cmd_stats(&db_path),
        Commands::Station {
            mmsi,
            db_path,
            limit,
        } => cmd_station(&mmsi, &db_path, limit),
        Commands::Prune {
            max_age_hours,
            db_path,
        } => cmd_prune(max_age_hours, &db_path),
        Commands::InitConfig { force } => cmd_init_config(force),
    }
}

fn open_input(file: &Path) -> Box<dyn BufRead> {
    if file.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        let f = std::fs::File::open(file).unwrap_or_else(|e| {
            eprintln!("Error opening {}: {e}", file.display());
            std::process::exit(1);
        });
        Box::new(io::BufReader::new(f))
    }
}

fn load_config(path: Option<&Path>) -> Config {
    match path {
        Some(p) => config::load_config_from(p).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }),
        None => config::load_config(),
    }
}

/// Arrival time for line `n` of a recorded file: 100 ms apart.
fn line_time(n: usize) -> i64 {
    n as i64 * 100
}

fn cmd_decode(file: PathBuf, raw: bool, verify_checksum: bool) {
    let reader = open_input(&file);

    let cfg = config::load_config();
    let mut options = cfg.pipeline_options();
    options.verify_checksum |= verify_checksum;
    let mut pipeline = Pipeline::new(cfg.known_stations(), options);

    let mut vessels: HashMap<Mmsi, VesselState> = HashMap::new();

    for (n, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "read error");
                continue;
            }
        };

        if let LineOutcome::Record(record) = pipeline.process_line(&line, line_time(n)) {
            if raw {
                match serde_json::to_string(&record) {
                    Ok(json) => println!("{json}"),
                    Err(e) => warn!(error = %e, "serialize failed"),
                }
            }

            vessels
                .entry(record.mmsi)
                .or_insert_with(|| VesselState::new(record.mmsi))
                .update(&record.message);
        }
    }

    if !raw {
        print_summary(&vessels, pipeline.stats());
    }
}

fn cmd_track(file: PathBuf, db_path: Option<String>, config_path: Option<PathBuf>) {
    let cfg = load_config(config_path.as_deref());
    let db_path = db_path.unwrap_or_else(|| cfg.database.path.clone());

    let mut database = db::Database::open(&db_path).unwrap_or_else(|e| {
        eprintln!("Error opening database {db_path}: {e}");
        std::process::exit(1);
    });

    let source = file.display().to_string();
    let capture_id = database.start_capture(&source).unwrap_or_else(|e| {
        eprintln!("Error writing database {db_path}: {e}");
        std::process::exit(1);
    });

    let mut pipeline = Pipeline::new(cfg.known_stations(), cfg.pipeline_options());
    let reader = open_input(&file);

    // Batch mode for throughput
    if let Err(e) = database.set_autocommit(false) {
        warn!(error = %e, "batch mode unavailable");
    }

    let mut write_errors = 0u64;
    for (n, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "read error");
                continue;
            }
        };

        if let Err(e) = pipeline.feed(&line, line_time(n), &mut database) {
            write_errors += 1;
            warn!(error = %e, "database write failed");
        }
    }

    let finish = database
        .end_capture(capture_id, pipeline.stats())
        .and_then(|_| database.flush())
        .and_then(|_| database.set_autocommit(true));
    if let Err(e) = finish {
        eprintln!("Error writing database {db_path}: {e}");
        std::process::exit(1);
    }
    info!(capture_id, write_errors, "track complete");

    // Print summary
    let stats = pipeline.stats();
    let db_stats = database.stats();
    println!();
    println!("Track complete: {}", file.display());
    println!(
        "  Lines: {} total, {} decoded, {} dropped, {} unsupported",
        stats.lines,
        stats.decoded,
        stats.dropped(),
        stats.unsupported
    );
    if write_errors > 0 {
        println!("  Write errors: {write_errors}");
    }
    println!();
    println!("Database: {db_path}");
    println!(
        "  {} stations ({} known, {} mobile), {} positions",
        db_stats.stations, db_stats.known, db_stats.mobile, db_stats.positions
    );

    let stations = match database.get_all_stations() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "station query failed");
            return;
        }
    };

    if !stations.is_empty() {
        println!();
        let mut table = Table::new();
        table.set_header(vec![
            "MMSI", "Class", "Name", "Callsign", "Type", "Lat", "Lon", "Speed", "Course", "Dest",
            "Msgs",
        ]);

        for st in &stations {
            table.add_row(vec![
                Cell::new(&st.mmsi),
                Cell::new(&st.class),
                Cell::new(st.shipname.as_deref().unwrap_or("-")),
                Cell::new(st.callsign.as_deref().unwrap_or("-")),
                Cell::new(opt(st.shiptype, |t| t.to_string())),
                Cell::new(opt(st.last_lat, |l| format!("{l:.4}"))),
                Cell::new(opt(st.last_lon, |l| format!("{l:.4}"))),
                Cell::new(opt(st.last_speed_kts, |s| format!("{s:.1}"))),
                Cell::new(opt(st.last_course_deg, |c| format!("{c:.1}"))),
                Cell::new(st.destination.as_deref().unwrap_or("-")),
                Cell::new(st.message_count),
            ]);
        }

        println!("{table}");
    }
}

fn cmd_stats(db_path: &str) {
    let database = open_database(db_path);

    let stats = database.stats();

    println!();
    println!("Database: {db_path}");
    println!();
    println!("  Stations:   {} ({} known, {} mobile)", stats.stations, stats.known, stats.mobile);
    println!("  Positions:  {}", stats.positions);
    println!("  Captures:   {}", stats.captures);
    println!();
}

fn open_database(db_path: &str) -> db::Database {
    db::Database::open(db_path).unwrap_or_else(|e| {
        eprintln!("Error opening database {db_path}: {e}");
        std::process::exit(1);
    })
}

fn cmd_station(mmsi: &str, db_path: &str, limit: i64) {
    let Some(mmsi) = mmsi_from_str(mmsi) else {
        eprintln!("Error: invalid MMSI {mmsi:?}");
        std::process::exit(1);
    };
    let database = open_database(db_path);

    let Some(st) = database.get_station(mmsi) else {
        eprintln!("Station {} not found in {db_path}", mmsi_to_string(mmsi));
        std::process::exit(1);
    };

    println!();
    println!("Station {} ({})", st.mmsi, st.class);
    println!("  Name:       {}", st.shipname.as_deref().unwrap_or("-"));
    println!("  Callsign:   {}", st.callsign.as_deref().unwrap_or("-"));
    println!("  Type:       {}", opt(st.shiptype, |t| t.to_string()));
    println!("  IMO:        {}", opt(st.imo, |i| i.to_string()));
    println!("  Dest:       {}", st.destination.as_deref().unwrap_or("-"));
    println!("  ETA:        {}", st.eta.as_deref().unwrap_or("-"));
    println!("  Draught:    {}", opt(st.draught_m, |d| format!("{d:.1} m")));
    if let Some(parent) = &st.mothership {
        println!("  Mothership: {parent}");
    }
    println!("  Messages:   {}", st.message_count);

    let positions = match database.get_positions(mmsi, limit) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "position query failed");
            return;
        }
    };
    if positions.is_empty() {
        println!();
        return;
    }

    println!();
    let mut table = Table::new();
    table.set_header(vec!["Time (ms)", "Type", "Lat", "Lon", "Speed", "Course", "Hdg"]);
    for p in &positions {
        table.add_row(vec![
            Cell::new(p.timestamp_ms),
            Cell::new(p.msg_type),
            Cell::new(format!("{:.4}", p.lat)),
            Cell::new(format!("{:.4}", p.lon)),
            Cell::new(opt(p.speed_kts, |s| format!("{s:.1}"))),
            Cell::new(opt(p.course_deg, |c| format!("{c:.1}"))),
            Cell::new(opt(p.heading, |h| h.to_string())),
        ]);
    }
    println!("{table}");
}

fn cmd_prune(max_age_hours: i64, db_path: &str) {
    let mut database = open_database(db_path);
    match database.prune_positions(max_age_hours) {
        Ok(removed) => {
            info!(removed, max_age_hours, "pruned positions");
            println!("Removed {removed} positions older than {max_age_hours}h from {db_path}");
        }
        Err(e) => {
            eprintln!("Error writing database {db_path}: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_init_config(force: bool) {
    let path = config::config_file();
    if path.exists() && !force {
        eprintln!("{} already exists (use --force to overwrite)", path.display());
        std::process::exit(1);
    }
    match config::save_config(&Config::default()) {
        Ok(path) => println!("Wrote {}", path.display()),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn opt<T>(value: Option<T>, f: impl FnOnce(T) -> String) -> String {
    value.map(f).unwrap_or_else(|| "-".into())
}

fn print_summary(vessels: &HashMap<Mmsi, VesselState>, stats: &PipelineStats) {
    println!();
    println!(
        "Lines: {} read, {} decoded, {} dropped, {} unsupported, {} vessels",
        stats.lines,
        stats.decoded,
        stats.dropped(),
        stats.unsupported,
        vessels.len()
    );
    if stats.checksum_mismatches > 0 || stats.fragments_discarded > 0 || stats.truncated > 0 {
        println!(
            "       {} checksum mismatches, {} fragments discarded, {} truncated",
            stats.checksum_mismatches, stats.fragments_discarded, stats.truncated
        );
    }
    println!();

    if vessels.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "MMSI", "Class", "Name", "Callsign", "Type", "Lat", "Lon", "Speed (kts)", "Course",
        "Hdg", "Dest", "Msgs",
    ]);

    let mut sorted: Vec<_> = vessels.values().collect();
    sorted.sort_by_key(|v| (std::cmp::Reverse(v.messages), v.mmsi));

    for v in sorted {
        table.add_row(vec![
            Cell::new(mmsi_to_string(v.mmsi)),
            Cell::new(if v.class_b { "B" } else { "A" }),
            Cell::new(v.shipname.as_deref().unwrap_or("-")),
            Cell::new(v.callsign.as_deref().unwrap_or("-")),
            Cell::new(opt(v.shiptype, |t| t.to_string())),
            Cell::new(opt(v.lat, |l| format!("{l:.4}"))),
            Cell::new(opt(v.lon, |l| format!("{l:.4}"))),
            Cell::new(opt(v.speed_kts, |s| format!("{s:.1}"))),
            Cell::new(opt(v.course_deg, |c| format!("{c:.1}"))),
            Cell::new(opt(v.heading, |h| h.to_string())),
            Cell::new(v.destination.as_deref().unwrap_or("-")),
            Cell::new(v.messages),
        ]);
    }

    println!("{table}");
}
