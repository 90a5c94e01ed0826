//! Configuration file management for ais-decode.
//!
//! Reads/writes `~/.ais-decode/config.yaml` with pipeline settings, the
//! NMEA feed address and the database path.

use std::path::{Path, PathBuf};

use crate::emitter::KnownStations;
use crate::pipeline::PipelineOptions;
use crate::types::{mmsi_from_str, AisError, Mmsi};

/// Conventional port for NMEA-over-TCP feeds.
pub const DEFAULT_FEED_PORT: u16 = 10110;

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub feed: FeedConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub verify_checksum: bool,
    pub clock_offset_ms: i64,
    /// Fixed stations (base stations, AtoNs, own fleet).
    pub known_stations: Vec<Mmsi>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub host: String,
    pub port: u16,
    pub reconnect_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pipeline: PipelineConfig {
                verify_checksum: false,
                clock_offset_ms: 0,
                known_stations: Vec::new(),
            },
            feed: FeedConfig {
                host: "127.0.0.1".into(),
                port: DEFAULT_FEED_PORT,
                reconnect_secs: 5,
            },
            database: DatabaseConfig {
                path: "data/ais.db".into(),
            },
        }
    }
}

impl Config {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            verify_checksum: self.pipeline.verify_checksum,
            clock_offset_ms: self.pipeline.clock_offset_ms,
            ..PipelineOptions::default()
        }
    }

    pub fn known_stations(&self) -> KnownStations {
        KnownStations::new(self.pipeline.known_stations.iter().copied())
    }
}

/// Get the config directory path (`~/.ais-decode/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".ais-decode")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.ais-decode/config.yaml`.
///
/// Returns default config if the file doesn't exist or can't be read.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }
    load_config_from(&path).unwrap_or_default()
}

/// Load config from an explicit path. Missing or unreadable files are errors.
pub fn load_config_from(path: &Path) -> Result<Config, AisError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AisError::Config(format!("{}: {e}", path.display())))?;
    parse_config(&text)
}

/// Save config to `~/.ais-decode/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf, AisError> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save config to an explicit path, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), AisError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| AisError::Config(e.to_string()))?;
    }
    let text = serialize_config(config);
    std::fs::write(path, text).map_err(|e| AisError::Config(format!("{}: {e}", path.display())))
}

/// Parse simple YAML-like config text.
///
/// Unknown sections and keys are ignored; a value that doesn't parse for a
/// known key is an error.
pub fn parse_config(text: &str) -> Result<Config, AisError> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for (n, line) in text.lines().enumerate() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();
        let bad = |what: &str| AisError::Config(format!("line {}: invalid {what}: {val:?}", n + 1));

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }

        let Some(section) = current_section.as_deref() else {
            continue;
        };
        match (section, key) {
            ("pipeline", "verify_checksum") => {
                config.pipeline.verify_checksum =
                    parse_bool_value(val).ok_or_else(|| bad("verify_checksum"))?;
            }
            ("pipeline", "clock_offset_ms") => {
                config.pipeline.clock_offset_ms =
                    val.parse().map_err(|_| bad("clock_offset_ms"))?;
            }
            ("pipeline", "known_stations") => {
                config.pipeline.known_stations =
                    parse_mmsi_list(val).ok_or_else(|| bad("known_stations"))?;
            }
            ("feed", "host") => {
                if let Some(v) = parse_string_value(val) {
                    config.feed.host = v;
                }
            }
            ("feed", "port") => {
                config.feed.port = val.parse().map_err(|_| bad("port"))?;
            }
            ("feed", "reconnect_secs") => {
                config.feed.reconnect_secs = val.parse().map_err(|_| bad("reconnect_secs"))?;
            }
            ("database", "path") => {
                if let Some(v) = parse_string_value(val) {
                    config.database.path = v;
                }
            }
            _ => {}
        }
    }

    Ok(config)
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn parse_bool_value(val: &str) -> Option<bool> {
    match val {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `[a, b, c]`, `a, b, c` or empty.
fn parse_mmsi_list(val: &str) -> Option<Vec<Mmsi>> {
    let inner = val.trim_start_matches('[').trim_end_matches(']').trim();
    if inner.is_empty() || inner == "null" || inner == "~" {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|s| mmsi_from_str(s.trim().trim_matches(['"', '\''])))
        .collect()
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# ais-decode configuration".to_string(), String::new()];

    lines.push("pipeline:".into());
    lines.push(format!("  verify_checksum: {}", config.pipeline.verify_checksum));
    lines.push(format!("  clock_offset_ms: {}", config.pipeline.clock_offset_ms));
    let known: Vec<String> = config
        .pipeline
        .known_stations
        .iter()
        .map(|m| m.to_string())
        .collect();
    lines.push(format!("  known_stations: [{}]", known.join(", ")));
    lines.push(String::new());

    lines.push("feed:".into());
    lines.push(format!("  host: \"{}\"", config.feed.host));
    lines.push(format!("  port: {}", config.feed.port));
    lines.push(format!("  reconnect_secs: {}", config.feed.reconnect_secs));
    lines.push(String::new());

    lines.push("database:".into());
    lines.push(format!("  path: \"{}\"", config.database.path));

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::StationDirectory;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.pipeline.verify_checksum);
        assert_eq!(config.feed.port, 10110);
        assert_eq!(config.database.path, "data/ais.db");
        assert!(config.pipeline.known_stations.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
pipeline:
  verify_checksum: true
  clock_offset_ms: -250
  known_stations: [2579999, 992351000]

feed:
  host: "192.168.1.20"
  port: 2000

database:
  path: "/tmp/test.db"
"#;
        let config = parse_config(text).unwrap();
        assert!(config.pipeline.verify_checksum);
        assert_eq!(config.pipeline.clock_offset_ms, -250);
        assert_eq!(config.pipeline.known_stations, vec![2_579_999, 992_351_000]);
        assert_eq!(config.feed.host, "192.168.1.20");
        assert_eq!(config.feed.port, 2000);
        assert_eq!(config.feed.reconnect_secs, 5);
        assert_eq!(config.database.path, "/tmp/test.db");
    }

    #[test]
    fn test_parse_config_null_and_unknown() {
        let text = r#"
pipeline:
  known_stations: ~
  something_else: 1

webhook: null
feed:
  host: null
"#;
        let config = parse_config(text).unwrap();
        assert!(config.pipeline.known_stations.is_empty());
        assert_eq!(config.feed.host, "127.0.0.1");
    }

    #[test]
    fn test_parse_config_bad_value() {
        let err = parse_config("feed:\n  port: lots\n").unwrap_err();
        assert!(matches!(err, AisError::Config(_)));
        assert!(parse_config("pipeline:\n  verify_checksum: maybe\n").is_err());
        assert!(parse_config("pipeline:\n  known_stations: [1, abc]\n").is_err());
    }

    #[test]
    fn test_roundtrip() {
        let config = Config {
            pipeline: PipelineConfig {
                verify_checksum: true,
                clock_offset_ms: 1500,
                known_stations: vec![3669702, 366999712],
            },
            feed: FeedConfig {
                host: "ais.local".into(),
                port: 5631,
                reconnect_secs: 30,
            },
            database: DatabaseConfig {
                path: "test.db".into(),
            },
        };
        let text = serialize_config(&config);
        assert_eq!(parse_config(&text).unwrap(), config);
    }

    #[test]
    fn test_pipeline_options_and_directory() {
        let mut config = Config::default();
        config.pipeline.verify_checksum = true;
        config.pipeline.clock_offset_ms = 42;
        config.pipeline.known_stations = vec![2_579_999];

        let options = config.pipeline_options();
        assert!(options.verify_checksum);
        assert_eq!(options.clock_offset_ms, 42);
        assert!(options.enabled);

        let known = config.known_stations();
        assert!(known.is_known(2_579_999));
        assert!(!known.is_known(1));
    }

    #[test]
    fn test_save_then_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = Config::default();
        config.feed.port = 10110;
        config.pipeline.known_stations = vec![3_669_702];

        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_config_from_missing_file() {
        let err = load_config_from(Path::new("/nonexistent/ais-decode.yaml")).unwrap_err();
        assert!(matches!(err, AisError::Config(_)));
    }
}
