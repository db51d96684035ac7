//! CLI subcommand definitions.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::config::Config;
use crate::sink::SinkKind;

/// Arguments of `start`; each one overrides the matching config value.
#[derive(Debug, Default, Args)]
pub struct StartCommand {
    /// Bounding box, "lat,lon^lat,lon" (south-west then north-east)
    #[arg(short, long)]
    pub bbox: Option<String>,

    /// Seconds between two polling cycles
    #[arg(short, long, value_name = "SECONDS")]
    pub refresh: Option<u64>,

    /// Where batches go
    #[arg(short, long, value_enum)]
    pub sink: Option<SinkArg>,

    /// Directory receiving per-run log directories (file sink)
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// File name of the raw stream (file sink)
    #[arg(long, value_name = "NAME")]
    pub output_raw: Option<String>,

    /// File name of the violation report (file sink)
    #[arg(long, value_name = "NAME")]
    pub output_report: Option<String>,
}

impl StartCommand {
    /// Apply the overrides given on the command line.
    pub fn apply(&self, config: &mut Config) {
        if let Some(bbox) = &self.bbox {
            config.tracker.bbox.clone_from(bbox);
        }
        if let Some(refresh) = self.refresh {
            config.tracker.refresh_secs = refresh;
        }
        if let Some(sink) = self.sink {
            config.tracker.sink = sink.into();
        }
        if let Some(dir) = &self.log_dir {
            config.file.log_dir.clone_from(dir);
        }
        if let Some(name) = &self.output_raw {
            config.file.output_raw.clone_from(name);
        }
        if let Some(name) = &self.output_report {
            config.file.output_report.clone_from(name);
        }
    }
}

/// Arguments of `serve`.
#[derive(Debug, Default, Args)]
pub struct ServeCommand {
    /// Address to listen on
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,
}

impl ServeCommand {
    /// Apply the overrides given on the command line. Serving always uses the
    /// database sink.
    pub fn apply(&self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.http.bind = bind;
        }
        config.tracker.sink = SinkKind::Db;
    }
}

/// Arguments of `search`.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Bounding box, "lat,lon^lat,lon"
    #[arg(short, long)]
    pub bbox: String,

    /// Maximum altitude in feet (inclusive)
    #[arg(short, long, value_name = "FEET", allow_negative_numbers = true)]
    pub alt_threshold_feet: i64,

    /// Window start, YYYY-MM-DDTHH:MM:SS (UTC)
    #[arg(long)]
    pub from: String,

    /// Window end, YYYY-MM-DDTHH:MM:SS (UTC)
    #[arg(long)]
    pub to: String,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the default configuration file path
    Path,

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Print a configuration file with every default value
    New {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Overwrite the output file if it exists
        #[arg(long, requires = "output")]
        force: bool,
    },
}

/// Sink selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkArg {
    /// Per-run log files
    File,
    /// Log output only
    Stdout,
    /// `SQLite` database
    Db,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::File => Self::File,
            SinkArg::Stdout => Self::Stdout,
            SinkArg::Db => Self::Db,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_overrides() {
        let cmd = StartCommand {
            bbox: Some("1,2^3,4".to_string()),
            refresh: Some(30),
            sink: Some(SinkArg::Stdout),
            output_raw: Some("raw.txt".to_string()),
            ..StartCommand::default()
        };
        let mut config = Config::default();
        cmd.apply(&mut config);

        assert_eq!(config.tracker.bbox, "1,2^3,4");
        assert_eq!(config.tracker.refresh_secs, 30);
        assert_eq!(config.tracker.sink, SinkKind::Stdout);
        assert_eq!(config.file.output_raw, "raw.txt");
        assert_eq!(config.file.output_report, "report.log");
    }

    #[test]
    fn test_start_without_overrides_keeps_config() {
        let mut config = Config::default();
        StartCommand::default().apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_serve_forces_database_sink() {
        let mut config = Config::default();
        ServeCommand {
            bind: Some("127.0.0.1:9000".parse().unwrap()),
        }
        .apply(&mut config);
        assert_eq!(config.tracker.sink, SinkKind::Db);
        assert_eq!(config.http.bind.port(), 9000);
    }

    #[test]
    fn test_sink_arg_conversion() {
        assert_eq!(SinkKind::from(SinkArg::File), SinkKind::File);
        assert_eq!(SinkKind::from(SinkArg::Stdout), SinkKind::Stdout);
        assert_eq!(SinkKind::from(SinkArg::Db), SinkKind::Db);
    }
}
