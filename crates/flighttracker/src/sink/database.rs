//! Database sink: every batch becomes rows in the flight store.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{Sink, SinkKind};
use crate::classifier::ViolationRule;
use crate::error::{Error, Result};
use crate::flight::FlightRecord;
use crate::store::FlightStore;

/// Sink inserting batches into a [`FlightStore`].
///
/// Violations are not written separately; each row carries a flag computed
/// with the sink's rule.
#[derive(Debug)]
pub struct DatabaseSink {
    path: PathBuf,
    rule: ViolationRule,
    store: Option<FlightStore>,
}

impl DatabaseSink {
    /// Create a database sink for the store at `path`. Opened by `init`.
    #[must_use]
    pub fn new(path: PathBuf, rule: ViolationRule) -> Self {
        Self {
            path,
            rule,
            store: None,
        }
    }

    /// The open store, once initialised.
    #[must_use]
    pub fn store(&self) -> Option<&FlightStore> {
        self.store.as_ref()
    }
}

#[async_trait::async_trait]
impl Sink for DatabaseSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Db
    }

    async fn init(&mut self) -> Result<()> {
        if self.store.is_none() {
            let path = self.path.clone();
            self.store = Some(super::blocking(move || FlightStore::open(path)).await?);
            info!(path = %self.path.display(), "Database sink initialised");
        }
        Ok(())
    }

    async fn sink(&mut self, _at: DateTime<Utc>, records: &[FlightRecord]) -> Result<()> {
        let violations = super::violations(&self.rule, records).len();
        let mut store = self
            .store
            .take()
            .ok_or(Error::SinkNotInitialized { sink: "database" })?;
        let rule = self.rule;
        let batch = records.to_vec();

        let (store, inserted) = super::blocking(move || {
            let inserted = store.insert_batch(&batch, &rule);
            Ok((store, inserted))
        })
        .await?;
        self.store = Some(store);

        match inserted {
            Ok(rows) => {
                info!(rows, violations, "Stored flight batch");
                Ok(())
            }
            Err(e) => {
                warn!(rows = records.len(), "Batch insert rolled back: {e}");
                Err(e)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(store) = self.store.take() {
            super::blocking(move || store.close()).await?;
            info!(path = %self.path.display(), "Database sink closed");
        }
        Ok(())
    }
}
