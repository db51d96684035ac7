//! Periodic fetch, decode, classify and sink pipeline.
//!
//! A [`Pipeline`] owns one feed and one initialised sink and runs cycles on a
//! fixed period until its cancellation token fires. The [`Scheduler`] wraps
//! it in a background task with a start/stop lifecycle:
//!
//! ```text
//! Idle -> Running -> Stopping -> Stopped -> Running -> ...
//! ```
//!
//! A failed cycle is logged and counted; it never ends the run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bbox::BoundingBox;
use crate::classifier::ViolationRule;
use crate::config::Config;
use crate::decoder;
use crate::error::{Error, Result};
use crate::feed::{Feed, HttpFeed};
use crate::sink::{build_sink, Sink};

/// Errors from the scheduler lifecycle.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `start` was called while a run is active.
    #[error("scheduler already running")]
    AlreadyRunning,

    /// `stop` was called with no active run.
    #[error("scheduler not running")]
    NotRunning,

    /// The pipeline could not be built (bad bounding box, sink init failure).
    #[error("failed to set up pipeline: {0}")]
    Setup(#[from] Error),

    /// The pipeline task panicked or was aborted.
    #[error("pipeline task failed: {0}")]
    Join(String),
}

/// Lifecycle state of a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// Never started.
    #[default]
    Idle,
    /// A pipeline task is running.
    Running,
    /// Cancellation requested; waiting for the task to finish.
    Stopping,
    /// The last run has finished.
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    /// Ticks that started a cycle.
    pub cycles: u64,
    /// Cycles that ended in an error.
    pub failed_cycles: u64,
    /// Records handed to the sink.
    pub records: u64,
    /// Violations among those records.
    pub violations: u64,
}

/// What one successful cycle produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Records decoded and sunk.
    pub records: usize,
    /// Violations among them.
    pub violations: usize,
    /// Fields that failed to decode and were defaulted.
    pub field_errors: usize,
    /// Top-level entries skipped because they were not arrays.
    pub skipped: usize,
}

/// One feed, one sink, one bounding box, one period.
pub struct Pipeline {
    bbox: BoundingBox,
    period: Duration,
    rule: ViolationRule,
    feed: Box<dyn Feed>,
    sink: Box<dyn Sink>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("bbox", &self.bbox)
            .field("period", &self.period)
            .field("rule", &self.rule)
            .field("sink", &self.sink.kind())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Assemble a pipeline. `sink` must already be initialised.
    #[must_use]
    pub fn new(
        bbox: BoundingBox,
        period: Duration,
        rule: ViolationRule,
        feed: Box<dyn Feed>,
        sink: Box<dyn Sink>,
    ) -> Self {
        Self {
            bbox,
            period,
            rule,
            feed,
            sink,
        }
    }

    /// Build the configured feed and sink and initialise the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the bounding box does not parse, the HTTP client
    /// cannot be built or the sink fails to initialise. These are setup
    /// failures: no cycle has run.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let bbox = config.bounding_box()?;
        if !bbox.is_ordered() {
            warn!(%bbox, "Bounding box corners are not south-west then north-east");
        }

        let feed = HttpFeed::from_config(&config.feed)?;
        let mut sink = build_sink(config);
        sink.init().await?;

        info!(
            %bbox,
            refresh_secs = config.tracker.refresh_secs,
            sink = %sink.kind(),
            "Pipeline ready"
        );
        Ok(Self::new(
            bbox,
            config.refresh_interval(),
            config.violation,
            Box::new(feed),
            sink,
        ))
    }

    /// Run one fetch, decode, classify and sink cycle.
    ///
    /// # Errors
    ///
    /// Returns the first error from the feed, the decoder or the sink.
    pub async fn cycle(&mut self) -> Result<CycleOutcome> {
        let at = Utc::now();
        let raw = self.feed.fetch(&self.bbox).await?;
        let decoded = decoder::decode(&raw)?;
        let violations = self.rule.classify(&decoded.records).len();

        self.sink.sink(at, &decoded.records).await?;

        Ok(CycleOutcome {
            records: decoded.records.len(),
            violations,
            field_errors: decoded.field_errors.len(),
            skipped: decoded.skipped,
        })
    }

    /// Run cycles every period until `token` is cancelled, then close the sink.
    ///
    /// The first cycle starts one full period after the call. A cycle in
    /// progress when the token fires is allowed to finish.
    pub async fn run(mut self, token: CancellationToken) -> PipelineStats {
        let mut stats = PipelineStats::default();
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period = ?self.period, "Pipeline started");
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    stats.cycles += 1;
                    match self.cycle().await {
                        Ok(outcome) => {
                            stats.records += outcome.records as u64;
                            stats.violations += outcome.violations as u64;
                            info!(
                                cycle = stats.cycles,
                                flights = outcome.records,
                                violations = outcome.violations,
                                field_errors = outcome.field_errors,
                                skipped = outcome.skipped,
                                "Cycle complete"
                            );
                        }
                        Err(e) => {
                            stats.failed_cycles += 1;
                            warn!(cycle = stats.cycles, "Cycle failed: {e}");
                        }
                    }
                }
            }
        }

        if let Err(e) = self.sink.close().await {
            warn!("Failed to close sink: {e}");
        }
        info!(
            cycles = stats.cycles,
            failed = stats.failed_cycles,
            "Pipeline stopped"
        );
        stats
    }
}

#[derive(Debug)]
struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<PipelineStats>,
}

/// Start/stop control over a background [`Pipeline`].
///
/// Shared between request handlers through an `Arc`; every method takes
/// `&self`.
#[derive(Debug)]
pub struct Scheduler {
    state: Arc<watch::Sender<SchedulerState>>,
    run: Mutex<Option<RunHandle>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            state: Arc::new(state),
            run: Mutex::new(None),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Whether a run is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Start `pipeline` in a background task.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if a run is active.
    pub async fn start(&self, pipeline: Pipeline) -> std::result::Result<(), SchedulerError> {
        self.start_with(|| async move { Ok(pipeline) }).await
    }

    /// Build a pipeline with `build` and start it, unless a run is already
    /// active. `build` is not called in that case, so no sink is initialised
    /// for a rejected start.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if a run is active and
    /// [`SchedulerError::Setup`] if `build` fails.
    pub async fn start_with<F, Fut>(&self, build: F) -> std::result::Result<(), SchedulerError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Pipeline>> + Send,
    {
        let mut run = self.run.lock().await;
        if run.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let pipeline = build().await?;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pipeline.run(cancel.clone()));

        *run = Some(RunHandle { cancel, task });
        self.state.send_replace(SchedulerState::Running);
        debug!("Scheduler running");
        Ok(())
    }

    /// Cancel the active run, wait for it to finish and return its counters.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRunning`] if there is no active run and
    /// [`SchedulerError::Join`] if the pipeline task panicked.
    pub async fn stop(&self) -> std::result::Result<PipelineStats, SchedulerError> {
        let mut run = self.run.lock().await;
        let Some(handle) = run.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.state.send_replace(SchedulerState::Stopping);
        handle.cancel.cancel();
        let result = handle.task.await;
        self.state.send_replace(SchedulerState::Stopped);
        debug!("Scheduler stopped");

        result.map_err(|e| SchedulerError::Join(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::FlightRecord;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PERIOD: Duration = Duration::from_secs(5);
    const PAYLOAD: &str = r#"{"full_count":1,"version":4,"abc123":["3c4b26","43.6","1.4",90,300,50,"","","","","1700000000","","","",0,"","",""]}"#;

    /// Fails the calls whose index is listed, answers `PAYLOAD` otherwise.
    struct ScriptedFeed {
        calls: Arc<AtomicUsize>,
        fail_on: Vec<usize>,
    }

    #[async_trait::async_trait]
    impl Feed for ScriptedFeed {
        async fn fetch(&self, _bbox: &BoundingBox) -> Result<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&call) {
                return Err(Error::FetchStatus {
                    status: 503,
                    url: "scripted".to_string(),
                });
            }
            Ok(PAYLOAD.as_bytes().to_vec())
        }
    }

    #[derive(Default)]
    struct Recorded {
        batches: Vec<usize>,
        closed: bool,
    }

    struct RecordingSink {
        recorded: Arc<std::sync::Mutex<Recorded>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Sink for RecordingSink {
        fn kind(&self) -> crate::sink::SinkKind {
            crate::sink::SinkKind::Stdout
        }

        async fn init(&mut self) -> Result<()> {
            Ok(())
        }

        async fn sink(&mut self, _at: DateTime<Utc>, records: &[FlightRecord]) -> Result<()> {
            if self.fail {
                return Err(Error::internal("sink down"));
            }
            self.recorded.lock().unwrap().batches.push(records.len());
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.recorded.lock().unwrap().closed = true;
            Ok(())
        }
    }

    struct Harness {
        calls: Arc<AtomicUsize>,
        recorded: Arc<std::sync::Mutex<Recorded>>,
    }

    fn pipeline(fail_on: Vec<usize>, sink_fails: bool) -> (Pipeline, Harness) {
        let calls = Arc::new(AtomicUsize::new(0));
        let recorded = Arc::new(std::sync::Mutex::new(Recorded::default()));
        let pipeline = Pipeline::new(
            BoundingBox::new(43.52, 1.32, 43.70, 1.69),
            PERIOD,
            ViolationRule::default(),
            Box::new(ScriptedFeed {
                calls: calls.clone(),
                fail_on,
            }),
            Box::new(RecordingSink {
                recorded: recorded.clone(),
                fail: sink_fails,
            }),
        );
        (pipeline, Harness { calls, recorded })
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_tick_fetches_nothing() {
        let (pipeline, harness) = pipeline(vec![], false);
        let scheduler = Scheduler::new();
        scheduler.start(pipeline).await.unwrap();

        tokio::time::sleep(PERIOD / 2).await;
        let stats = scheduler.stop().await.unwrap();

        assert_eq!(harness.calls.load(Ordering::SeqCst), 0);
        assert_eq!(stats, PipelineStats::default());
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(harness.recorded.lock().unwrap().closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_does_not_stop_the_loop() {
        let (pipeline, harness) = pipeline(vec![0], false);
        let scheduler = Scheduler::new();
        scheduler.start(pipeline).await.unwrap();

        tokio::time::sleep(PERIOD * 3 + PERIOD / 2).await;
        let stats = scheduler.stop().await.unwrap();

        assert_eq!(harness.calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.failed_cycles, 1);
        assert_eq!(stats.records, 2);
        assert_eq!(stats.violations, 2);
        assert_eq!(harness.recorded.lock().unwrap().batches, vec![1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_is_counted_not_fatal() {
        let (pipeline, harness) = pipeline(vec![], true);
        let scheduler = Scheduler::new();
        scheduler.start(pipeline).await.unwrap();

        tokio::time::sleep(PERIOD * 2 + PERIOD / 2).await;
        let stats = scheduler.stop().await.unwrap();

        assert_eq!(harness.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stats.failed_cycles, 2);
        assert_eq!(stats.records, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_states() {
        let scheduler = Scheduler::new();
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let (first, _) = pipeline(vec![], false);
        scheduler.start(first).await.unwrap();
        assert!(scheduler.is_running());

        let (second, _) = pipeline(vec![], false);
        assert!(matches!(
            scheduler.start(second).await,
            Err(SchedulerError::AlreadyRunning)
        ));

        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(matches!(
            scheduler.stop().await,
            Err(SchedulerError::NotRunning)
        ));

        let (third, _) = pipeline(vec![], false);
        scheduler.start(third).await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_with_skips_build_when_running() {
        let scheduler = Scheduler::new();
        let (first, _) = pipeline(vec![], false);
        scheduler.start(first).await.unwrap();

        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let result = scheduler
            .start_with(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::internal("should not be built"))
            })
            .await;

        assert!(matches!(result, Err(SchedulerError::AlreadyRunning)));
        assert_eq!(built.load(Ordering::SeqCst), 0);
        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_with_setup_failure_leaves_scheduler_idle() {
        let scheduler = Scheduler::new();
        let result = scheduler
            .start_with(|| async { Err(Error::config("bad bbox")) })
            .await;

        assert!(matches!(result, Err(SchedulerError::Setup(_))));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_transitions() {
        let scheduler = Scheduler::new();
        let mut rx = scheduler.subscribe();

        let (p, _) = pipeline(vec![], false);
        scheduler.start(p).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SchedulerState::Running);

        scheduler.stop().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn test_cycle_decodes_and_sinks() {
        let (mut p, harness) = pipeline(vec![], false);
        let outcome = p.cycle().await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome {
                records: 1,
                violations: 1,
                field_errors: 0,
                skipped: 0,
            }
        );
        assert_eq!(harness.recorded.lock().unwrap().batches, vec![1]);
    }

    #[tokio::test]
    async fn test_from_config_rejects_bad_bbox() {
        let mut config = Config::default();
        config.tracker.bbox = "not a box".to_string();
        config.tracker.sink = crate::sink::SinkKind::Stdout;
        let err = Pipeline::from_config(&config).await.unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[tokio::test]
    async fn test_from_config_initialises_sink() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.tracker.sink = crate::sink::SinkKind::Db;
        config.database.path = Some(dir.path().join("flights.db"));

        let pipeline = Pipeline::from_config(&config).await.unwrap();
        assert!(dir.path().join("flights.db").exists());
        assert!(format!("{pipeline:?}").contains("Db"));
    }
}
