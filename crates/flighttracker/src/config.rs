//! Configuration management for flighttracker.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::classifier::ViolationRule;
use crate::error::{Error, Result};
use crate::sink::SinkKind;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "flighttracker";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "flights.db";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "FLIGHTTRACKER_";

/// Default feed endpoint.
pub const DEFAULT_FEED_URL: &str = "https://data-live.flightradar24.com/zones/fcgi/feed.js";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FLIGHTTRACKER_`, sections split by `__`)
/// 2. TOML config file at `~/.config/flighttracker/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline configuration.
    pub tracker: TrackerConfig,
    /// Violation rule.
    pub violation: ViolationRule,
    /// Feed client configuration.
    pub feed: FeedConfig,
    /// File sink configuration.
    pub file: FileConfig,
    /// Database sink configuration.
    pub database: DatabaseConfig,
    /// HTTP control surface configuration.
    pub http: HttpConfig,
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Bounding box to watch, `"lat,lon^lat,lon"` (south-west then north-east).
    pub bbox: String,
    /// Seconds between two polling cycles.
    pub refresh_secs: u64,
    /// Which sink receives the decoded batches.
    pub sink: SinkKind,
}

/// Feed client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed endpoint, without query string.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// File sink configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Directory under which a run directory is created.
    pub log_dir: PathBuf,
    /// File name of the stream receiving every batch.
    pub output_raw: String,
    /// File name of the stream receiving violations only.
    pub output_report: String,
}

/// Database sink configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/flighttracker/flights.db`
    pub path: Option<PathBuf>,
}

/// HTTP control surface configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address the control surface listens on.
    pub bind: SocketAddr,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            bbox: "43.52,1.32^43.70,1.69".to_string(), // Toulouse and airport area
            refresh_secs: 5,
            sink: SinkKind::File,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("log"),
            output_raw: "rawData.log".to_string(),
            output_report: "report.log".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.bounding_box()?;

        if self.tracker.refresh_secs == 0 {
            return Err(Error::config("refresh_secs must be greater than 0"));
        }

        if self.violation.floor_meters >= self.violation.ceiling_meters {
            return Err(Error::config(format!(
                "violation floor ({} m) must be below the ceiling ({} m)",
                self.violation.floor_meters, self.violation.ceiling_meters
            )));
        }

        if self.feed.timeout_secs == 0 {
            return Err(Error::config("feed timeout_secs must be greater than 0"));
        }

        if self.file.output_raw.trim().is_empty() || self.file.output_report.trim().is_empty() {
            return Err(Error::config("output file names cannot be empty"));
        }

        Ok(())
    }

    /// Parse the configured bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BoundingBox`] if the box string is malformed.
    pub fn bounding_box(&self) -> Result<BoundingBox> {
        Ok(self.tracker.bbox.parse()?)
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the refresh interval as a Duration.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.tracker.refresh_secs)
    }

    /// Get the feed request timeout as a Duration.
    #[must_use]
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.timeout_secs)
    }

    /// Render the configuration as a TOML file, with the database path
    /// resolved so the file states where data will live.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigRender`] if a value has no TOML form, such as a
    /// path that is not valid UTF-8.
    pub fn to_toml(&self) -> Result<String> {
        let mut resolved = self.clone();
        resolved.database.path = Some(self.database_path());
        Ok(toml::to_string_pretty(&resolved)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.tracker.bbox, "43.52,1.32^43.70,1.69");
        assert_eq!(config.tracker.refresh_secs, 5);
        assert_eq!(config.tracker.sink, SinkKind::File);
        assert_eq!(config.file.output_raw, "rawData.log");
        assert_eq!(config.file.output_report, "report.log");
        assert_eq!(config.http.bind.port(), 8080);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_bbox() {
        let mut config = Config::default();
        config.tracker.bbox = "43.52,1.32".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("bounding box"));
    }

    #[test]
    fn test_validate_zero_refresh() {
        let mut config = Config::default();
        config.tracker.refresh_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("refresh_secs"));
    }

    #[test]
    fn test_validate_inverted_violation_band() {
        let mut config = Config::default();
        config.violation.floor_meters = 600.0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("floor"));
    }

    #[test]
    fn test_validate_empty_output_name() {
        let mut config = Config::default();
        config.file.output_report = "  ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_feed_timeout() {
        let mut config = Config::default();
        config.feed.timeout_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout_secs"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("flights.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.database.path = Some(PathBuf::from("/custom/path/flights.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/flights.sqlite")
        );
    }

    #[test]
    fn test_intervals() {
        let config = Config::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.feed_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("flighttracker"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[tracker]\nbbox = \"1,2^3,4\"\nrefresh_secs = 10\nsink = \"DB\"\n\n\
             [violation]\nfloor_meters = 0.0\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.tracker.bbox, "1,2^3,4");
        assert_eq!(config.tracker.refresh_secs, 10);
        assert_eq!(config.tracker.sink, SinkKind::Db);
        assert!(config.violation.floor_meters.abs() < f64::EPSILON);
        assert!((config.violation.ceiling_meters - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_rejects_unknown_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tracker]\nsink = \"KAFKA\"\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigLoad(_)));
    }

    #[test]
    fn test_to_toml_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.database.path = Some(dir.path().join("flights.db"));
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = Config::load_from(Some(path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_to_toml_escapes_quotes_and_backslashes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.file.output_raw = "raw \"today\".log".to_string();
        config.file.log_dir = PathBuf::from(r"C:\flights\log");
        config.database.path = Some(PathBuf::from(r"C:\Users\pilot\flights.db"));
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = Config::load_from(Some(path)).unwrap();
        assert_eq!(loaded.file.output_raw, "raw \"today\".log");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_to_toml_resolves_database_path() {
        let text = Config::default().to_toml().unwrap();
        assert!(text.contains("[database]"));
        assert!(text.contains("flights.db"));
        assert!(text.contains("sink = \"FILE\""));
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("refresh_secs"));
        assert!(json.contains("\"FILE\""));
    }
}
