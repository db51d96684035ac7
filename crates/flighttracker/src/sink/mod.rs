//! Persistence targets for decoded flight batches.
//!
//! Every backend implements [`Sink`]: `init` once, then `sink` once per
//! cycle with the full batch. Each backend persists the batch and, in its own
//! way, the violating subset selected by its [`ViolationRule`].

pub mod database;
pub mod file;
pub mod stdout;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::ViolationRule;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::flight::FlightRecord;

pub use database::DatabaseSink;
pub use file::FileSink;
pub use stdout::StdoutSink;

/// The available sink backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SinkKind {
    /// Two append-only log files under a per-run directory.
    #[default]
    #[serde(alias = "file")]
    File,
    /// Structured log output only.
    #[serde(alias = "stdout")]
    Stdout,
    /// Embedded SQL database.
    #[serde(alias = "db")]
    Db,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "FILE"),
            Self::Stdout => write!(f, "STDOUT"),
            Self::Db => write!(f, "DB"),
        }
    }
}

/// A persistence backend for flight batches.
#[async_trait::async_trait]
pub trait Sink: Send {
    /// Which backend this is.
    fn kind(&self) -> SinkKind;

    /// Prepare the backend (create files, open connections, ensure schema).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be prepared. This is a setup
    /// failure and should stop the caller from starting the pipeline.
    async fn init(&mut self) -> Result<()>;

    /// Persist one batch fetched at `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be written, or if `init` was
    /// never called.
    async fn sink(&mut self, at: DateTime<Utc>, records: &[FlightRecord]) -> Result<()>;

    /// Flush and release backend resources.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered data could not be flushed.
    async fn close(&mut self) -> Result<()>;
}

/// Build the sink selected by the configuration. The sink is not initialised.
#[must_use]
pub fn build_sink(config: &Config) -> Box<dyn Sink> {
    let rule = config.violation;
    match config.tracker.sink {
        SinkKind::File => Box::new(FileSink::new(config.file.clone(), rule)),
        SinkKind::Stdout => Box::new(StdoutSink::new(rule)),
        SinkKind::Db => Box::new(DatabaseSink::new(config.database_path(), rule)),
    }
}

/// Run blocking file or database work off the async worker threads.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::internal(format!("sink task failed: {e}")))?
}

/// Shared helper: split a batch with `rule` and log the counts.
pub(crate) fn violations<'a>(
    rule: &ViolationRule,
    records: &'a [FlightRecord],
) -> Vec<&'a FlightRecord> {
    let violations = rule.classify(records);
    tracing::debug!(
        flights = records.len(),
        violations = violations.len(),
        "Classified batch"
    );
    violations
}
