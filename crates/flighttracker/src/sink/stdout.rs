//! Stdout sink: batches go to the structured log.

use chrono::{DateTime, Utc};
use tracing::info;

use super::{Sink, SinkKind};
use crate::classifier::ViolationRule;
use crate::error::Result;
use crate::flight::FlightRecord;

/// Sink emitting each batch, and its violations, as log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink {
    rule: ViolationRule,
    batches: u64,
}

impl StdoutSink {
    /// Create a stdout sink classifying with `rule`.
    #[must_use]
    pub fn new(rule: ViolationRule) -> Self {
        Self { rule, batches: 0 }
    }

    /// Batches emitted so far.
    #[must_use]
    pub fn batches(&self) -> u64 {
        self.batches
    }
}

#[async_trait::async_trait]
impl Sink for StdoutSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Stdout
    }

    async fn init(&mut self) -> Result<()> {
        Ok(())
    }

    async fn sink(&mut self, at: DateTime<Utc>, records: &[FlightRecord]) -> Result<()> {
        let violations = super::violations(&self.rule, records);
        let raw = serde_json::to_string(records)?;
        let report = serde_json::to_string(&violations)?;

        info!(at = %at.to_rfc3339(), flights = records.len(), data = %raw, "raw data");
        info!(
            at = %at.to_rfc3339(),
            violations = violations.len(),
            data = %report,
            "illegal flights"
        );
        self.batches += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        info!(batches = self.batches, "Stdout sink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_sink_counts_batches() {
        let mut sink = StdoutSink::new(ViolationRule::default());
        sink.init().await.unwrap();
        sink.sink(Utc::now(), &[]).await.unwrap();
        sink.sink(Utc::now(), &[FlightRecord::new("x")]).await.unwrap();
        assert_eq!(sink.batches(), 2);
        sink.close().await.unwrap();
    }

    #[test]
    fn test_stdout_sink_kind() {
        assert_eq!(StdoutSink::default().kind(), SinkKind::Stdout);
    }
}
