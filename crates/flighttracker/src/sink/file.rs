//! File sink: two append-only logs per run.
//!
//! `init` creates `<log_dir>/<unix-timestamp>/` and opens the raw stream (every
//! batch) and the report stream (violations only) in it. Every `sink` call
//! appends one entry to each stream:
//!
//! ```text
//! <timestamp> <label>
//! <JSON array>
//! ====================================
//! ```
//!
//! An empty batch still appends an entry, with a placeholder line instead of
//! the JSON array.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::{Sink, SinkKind};
use crate::classifier::ViolationRule;
use crate::config::FileConfig;
use crate::error::{Error, Result};
use crate::flight::FlightRecord;

/// Line closing every entry.
pub const SEPARATOR: &str = "====================================";

/// Placeholder written to the raw stream for an empty batch.
pub const NO_DATA: &str = "no data";

/// Placeholder written to the report stream when nothing violates the rule.
pub const NO_VIOLATION: &str = "no illegal flight";

const RAW_LABEL: &str = "raw data";
const REPORT_LABEL: &str = "illegal flights";

/// Sink writing batches to log files.
#[derive(Debug)]
pub struct FileSink {
    config: FileConfig,
    rule: ViolationRule,
    streams: Option<Streams>,
}

#[derive(Debug)]
struct Streams {
    run_dir: PathBuf,
    raw: BufWriter<File>,
    report: BufWriter<File>,
}

impl FileSink {
    /// Create a file sink. Nothing touches the disk until `init`.
    #[must_use]
    pub fn new(config: FileConfig, rule: ViolationRule) -> Self {
        Self {
            config,
            rule,
            streams: None,
        }
    }

    /// The directory holding this run's files, once initialised.
    #[must_use]
    pub fn run_dir(&self) -> Option<&Path> {
        self.streams.as_ref().map(|s| s.run_dir.as_path())
    }
}

#[async_trait::async_trait]
impl Sink for FileSink {
    fn kind(&self) -> SinkKind {
        SinkKind::File
    }

    async fn init(&mut self) -> Result<()> {
        if let Some(streams) = &self.streams {
            debug!(run_dir = %streams.run_dir.display(), "File sink already initialised");
            return Ok(());
        }

        let config = self.config.clone();
        let streams = super::blocking(move || open_streams(&config)).await?;
        info!(
            run_dir = %streams.run_dir.display(),
            raw = %self.config.output_raw,
            report = %self.config.output_report,
            "File sink initialised"
        );
        self.streams = Some(streams);
        Ok(())
    }

    async fn sink(&mut self, at: DateTime<Utc>, records: &[FlightRecord]) -> Result<()> {
        let mut streams = self
            .streams
            .take()
            .ok_or(Error::SinkNotInitialized { sink: "file" })?;
        let rule = self.rule;
        let records = records.to_vec();

        let (streams, written) = super::blocking(move || {
            let written = streams.append(&at.to_rfc3339(), &rule, &records);
            Ok((streams, written))
        })
        .await?;
        self.streams = Some(streams);
        written
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut streams) = self.streams.take() {
            let run_dir = super::blocking(move || {
                streams.raw.flush()?;
                streams.report.flush()?;
                Ok(streams.run_dir)
            })
            .await?;
            info!(run_dir = %run_dir.display(), "File sink closed");
        }
        Ok(())
    }
}

impl Streams {
    /// Append one entry for `records` to the raw stream and one for its
    /// violating subset to the report stream.
    fn append(
        &mut self,
        header: &str,
        rule: &ViolationRule,
        records: &[FlightRecord],
    ) -> Result<()> {
        let violations = super::violations(rule, records);
        let written = write_entry(&mut self.raw, header, RAW_LABEL, records, NO_DATA)?;
        debug!(bytes = written, "Wrote raw entry");
        let written = write_entry(
            &mut self.report,
            header,
            REPORT_LABEL,
            &violations,
            NO_VIOLATION,
        )?;
        debug!(bytes = written, "Wrote report entry");
        Ok(())
    }
}

fn open_streams(config: &FileConfig) -> Result<Streams> {
    let run_dir = config.log_dir.join(Utc::now().timestamp().to_string());
    std::fs::create_dir_all(&run_dir).map_err(|source| Error::DirectoryCreate {
        path: run_dir.clone(),
        source,
    })?;

    let raw = open_append(&run_dir.join(&config.output_raw))?;
    let report = open_append(&run_dir.join(&config.output_report))?;

    Ok(Streams {
        run_dir,
        raw: BufWriter::new(raw),
        report: BufWriter::new(report),
    })
}

fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Append one entry and flush; returns the number of bytes written.
fn write_entry<W: Write, T: Serialize>(
    out: &mut W,
    header: &str,
    label: &str,
    items: &[T],
    placeholder: &str,
) -> Result<usize> {
    let entry = if items.is_empty() {
        format!("{header}\n{placeholder}\n{SEPARATOR}\n")
    } else {
        let json = serde_json::to_string(items)?;
        format!("{header} {label}\n{json}\n{SEPARATOR}\n")
    };
    out.write_all(entry.as_bytes())?;
    out.flush()?;
    Ok(entry.len())
}
