//! Bulk import orchestrator
//!
//! Drives the end-to-end flow: materialize the event stream, validate
//! ordering (re-sorting the whole stream in memory when inversions were
//! found), replay events in batches through feature-state updates and the
//! clickthrough buffer, then flush and synchronize.
//!
//! For a remote store with staging enabled, replay goes into a fresh local
//! disk backend and the result is bulk-transferred to the remote backend in
//! one pass, trading a temporary directory for an order-of-magnitude
//! reduction in remote round trips.
//!
//! The importer materializes the whole stream (the re-sort fallback needs
//! it); it is a bulk-import tool and must not be pointed at an unbounded
//! live stream.

use crate::buffer::{BufferConfig, BufferCounters, ClickthroughBuffer};
use crate::sink::TrainingSink;
use crate::source::EventSource;
use crate::validate::{OrderingValidator, OrderingViolation, TimestampOrderValidator};
use chrono::{DateTime, Utc};
use rankstore_core::{Error, Event, Result};
use rankstore_store::{transfer, BackendConfig, BackendKind, StateUpdate, Store};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

/// Produces feature-state updates for each event
///
/// The numeric feature algorithms live behind this seam; the importer only
/// replays whatever updates they produce, in event order.
pub trait FeatureUpdater: Send + Sync {
    /// State updates this event causes, in application order
    fn updates_for(&self, event: &Event) -> Vec<StateUpdate>;
}

/// Updater for pipelines that only correlate clickthroughs
#[derive(Debug, Clone, Copy, Default)]
pub struct NullUpdater;

impl FeatureUpdater for NullUpdater {
    fn updates_for(&self, _event: &Event) -> Vec<StateUpdate> {
        Vec::new()
    }
}

/// Import tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Run ordering validation (and the re-sort fallback) before replay
    pub validate: bool,
    /// Stage replay into a local disk backend in this directory, then bulk
    /// transfer; only effective for remote stores
    pub staging_dir: Option<PathBuf>,
    /// Events per replay batch
    pub batch_size: usize,
    /// Clickthrough buffer tuning
    pub buffer: BufferConfig,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            validate: true,
            staging_dir: None,
            batch_size: 1_024,
            buffer: BufferConfig::default(),
        }
    }
}

/// Aggregate counts of one import run
#[derive(Debug, Clone)]
pub struct ImportReport {
    /// Events replayed
    pub events: u64,
    /// Feature-state updates applied
    pub updates: u64,
    /// Training records emitted
    pub records: u64,
    /// Whether the in-memory re-sort fallback ran
    pub resorted: bool,
    /// Whether replay went through a staging backend
    pub staged: bool,
    /// Whether a shutdown request stopped replay early
    pub interrupted: bool,
    /// Clickthrough buffer counters
    pub buffer: BufferCounters,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

/// Bulk import driver
pub struct Importer {
    updater: Arc<dyn FeatureUpdater>,
    sink: Arc<dyn TrainingSink>,
    validator: Box<dyn OrderingValidator>,
}

impl Importer {
    /// Importer with the default timestamp-order validator
    pub fn new(updater: Arc<dyn FeatureUpdater>, sink: Arc<dyn TrainingSink>) -> Self {
        Self {
            updater,
            sink,
            validator: Box::new(TimestampOrderValidator),
        }
    }

    /// Replace the ordering validator
    pub fn with_validator(mut self, validator: Box<dyn OrderingValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Run an import to completion
    pub async fn run(
        &self,
        store: &Store,
        source: impl EventSource,
        config: &ImportConfig,
    ) -> Result<ImportReport> {
        let (_tx, rx) = watch::channel(false);
        self.run_with_shutdown(store, source, config, rx).await
    }

    /// Run an import, stopping cleanly when `shutdown` flips to `true`
    ///
    /// A deliberate stop still flushes the clickthrough buffer and
    /// synchronizes the backend; no partial-import state is left
    /// un-flushed.
    pub async fn run_with_shutdown(
        &self,
        store: &Store,
        mut source: impl EventSource,
        config: &ImportConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<ImportReport> {
        let started = Instant::now();
        let mut interrupted = false;

        let mut events = Vec::new();
        while let Some(event) = source.next_event().await? {
            events.push(event);
            if *shutdown.borrow() {
                warn!(read = events.len(), "shutdown requested while reading stream");
                interrupted = true;
                break;
            }
        }
        info!(events = events.len(), backend = %store.kind(), "event stream materialized");

        let mut resorted = false;
        let mut enforce = false;
        if config.validate {
            let violations = self.validator.validate(&events);
            let inversions = violations
                .iter()
                .filter(|v| matches!(v, OrderingViolation::TimestampInversion { .. }))
                .count();
            if inversions > 0 {
                warn!(inversions, "timestamp inversions found; re-sorting stream in memory");
                // Stable sort: events with equal timestamps keep input order.
                events.sort_by_key(Event::timestamp);
                resorted = true;
            } else {
                enforce = true;
            }
        }

        let staging = match (&config.staging_dir, store.kind()) {
            (Some(dir), BackendKind::Remote) => {
                let path = dir.join("staging.redb");
                info!(path = %path.display(), "staging replay into a local disk backend");
                Some(Store::open(&BackendConfig::disk(path), store.mapping()).await?)
            }
            (Some(_), kind) => {
                warn!(backend = %kind, "staging requested for a non-remote backend; importing directly");
                None
            }
            (None, _) => None,
        };
        let target = staging.as_ref().unwrap_or(store);

        let mut buffer =
            ClickthroughBuffer::attach(target, Arc::clone(&self.sink), &config.buffer).await?;
        let mut processed: u64 = 0;
        let mut updates: u64 = 0;
        let mut last_ts: Option<DateTime<Utc>> = None;

        'replay: for batch in events.chunks(config.batch_size.max(1)) {
            if *shutdown.borrow() {
                warn!(processed, "shutdown requested; stopping replay");
                interrupted = true;
                break 'replay;
            }
            for event in batch {
                let timestamp = event.timestamp();
                if enforce {
                    // Last-resort guard: validation claimed the stream was
                    // ordered.
                    if let Some(prev) = last_ts {
                        if timestamp < prev {
                            return Err(Error::StreamInverted {
                                position: processed as usize,
                                prev,
                                next: timestamp,
                            });
                        }
                    }
                }
                last_ts = Some(timestamp);

                for update in self.updater.updates_for(event) {
                    target.apply(&update).await?;
                    updates += 1;
                }
                match event {
                    Event::Impression(e) => buffer.on_impression(e).await?,
                    Event::Outcome(e) => buffer.on_outcome(e).await?,
                    Event::Metadata(_) => {}
                }
                processed += 1;
            }
        }

        buffer.flush_all().await?;
        self.sink.flush().await?;
        if let Some(staging) = &staging {
            staging.sync().await?;
            let source_backend = staging.backend();
            let destination_backend = store.backend();
            transfer::transfer(
                source_backend.as_ref(),
                destination_backend.as_ref(),
                store.mapping(),
            )
            .await?;
        }
        store.sync().await?;

        let report = ImportReport {
            events: processed,
            updates,
            records: buffer.counters().emitted,
            resorted,
            staged: staging.is_some(),
            interrupted,
            buffer: buffer.counters().clone(),
            elapsed: started.elapsed(),
        };
        info!(
            events = report.events,
            updates = report.updates,
            records = report.records,
            resorted = report.resorted,
            staged = report.staged,
            interrupted = report.interrupted,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "import finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::VecSink;
    use crate::source::VecSource;
    use rankstore_core::{
        EventId, FeatureMapping, ImpressionEvent, ItemId, OutcomeEvent, RequestId, Scope,
        StateDescriptor, StateValue, UserId,
    };
    use rankstore_store::StateOp;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    fn impression(request: &str, secs: i64) -> Event {
        Event::Impression(ImpressionEvent {
            id: EventId::new(),
            request: RequestId::new(request),
            timestamp: ts(secs),
            user: UserId::new("u1"),
            items: vec![ItemId::new("a")],
        })
    }

    fn outcome(request: &str, secs: i64) -> Event {
        Event::Outcome(OutcomeEvent {
            id: EventId::new(),
            request: RequestId::new(request),
            timestamp: ts(secs),
            item: ItemId::new("a"),
            interaction: "click".to_string(),
        })
    }

    fn mapping() -> FeatureMapping {
        FeatureMapping::new(vec![StateDescriptor::value("events_seen", ["user"]).unwrap()])
            .unwrap()
    }

    /// Counts events per user into value state
    struct CountingUpdater;

    impl FeatureUpdater for CountingUpdater {
        fn updates_for(&self, event: &Event) -> Vec<StateUpdate> {
            let user = match event {
                Event::Impression(e) => e.user.clone(),
                _ => return Vec::new(),
            };
            vec![StateUpdate {
                state: "events_seen".to_string(),
                scope: Scope::user(&user),
                sub_key: None,
                op: StateOp::Put(StateValue::Timestamp(event.timestamp())),
            }]
        }
    }

    #[tokio::test]
    async fn test_import_correlates_and_counts() {
        let store = Store::open(&BackendConfig::heap(), &mapping()).await.unwrap();
        let sink = Arc::new(VecSink::new());
        let importer = Importer::new(Arc::new(CountingUpdater), sink.clone());

        let events = vec![
            impression("r1", 10),
            outcome("r1", 20),
            impression("r2", 30),
        ];
        let report = importer
            .run(&store, VecSource::new(events), &ImportConfig::default())
            .await
            .unwrap();

        assert_eq!(report.events, 3);
        assert_eq!(report.updates, 2);
        assert_eq!(report.records, 2);
        assert!(!report.resorted);
        assert!(!report.staged);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_inverted_stream_is_resorted() {
        let store = Store::open(&BackendConfig::heap(), &mapping()).await.unwrap();
        let sink = Arc::new(VecSink::new());
        let importer = Importer::new(Arc::new(NullUpdater), sink.clone());

        // The outcome arrives before its impression in input order.
        let events = vec![
            impression("r1", 10),
            outcome("r2", 40),
            impression("r2", 30),
        ];
        let report = importer
            .run(&store, VecSource::new(events), &ImportConfig::default())
            .await
            .unwrap();

        assert!(report.resorted);
        // Post-sort, the impression precedes the outcome and they match.
        assert_eq!(report.buffer.matched_outcomes, 1);
        let records = sink.records();
        let r2 = records
            .iter()
            .find(|r| r.request.as_str() == "r2")
            .unwrap();
        assert_eq!(r2.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_validation_off_skips_resort() {
        let store = Store::open(&BackendConfig::heap(), &mapping()).await.unwrap();
        let sink = Arc::new(VecSink::new());
        let importer = Importer::new(Arc::new(NullUpdater), sink.clone());

        let events = vec![impression("r1", 10), impression("r2", 5)];
        let config = ImportConfig {
            validate: false,
            ..ImportConfig::default()
        };
        let report = importer
            .run(&store, VecSource::new(events), &config)
            .await
            .unwrap();
        assert!(!report.resorted);
        assert_eq!(report.events, 2);
    }

    #[tokio::test]
    async fn test_shutdown_still_flushes_buffer() {
        let store = Store::open(&BackendConfig::heap(), &mapping()).await.unwrap();
        let sink = Arc::new(VecSink::new());
        let importer = Importer::new(Arc::new(NullUpdater), sink.clone());

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let events = vec![impression("r1", 10), impression("r2", 20)];
        let report = importer
            .run_with_shutdown(
                &store,
                VecSource::new(events),
                &ImportConfig::default(),
                rx,
            )
            .await
            .unwrap();

        assert!(report.interrupted);
        // Whatever made it into the buffer was flushed, not dropped.
        assert_eq!(report.records, report.buffer.emitted);
        assert_eq!(report.buffer.expired, report.buffer.emitted);
    }

    #[tokio::test]
    async fn test_staging_for_non_remote_backend_falls_back_to_direct() {
        let store = Store::open(&BackendConfig::heap(), &mapping()).await.unwrap();
        let sink = Arc::new(VecSink::new());
        let importer = Importer::new(Arc::new(NullUpdater), sink.clone());

        let dir = tempfile::tempdir().unwrap();
        let config = ImportConfig {
            staging_dir: Some(dir.path().to_path_buf()),
            ..ImportConfig::default()
        };
        let report = importer
            .run(&store, VecSource::new(vec![impression("r1", 10)]), &config)
            .await
            .unwrap();
        assert!(!report.staged);
        assert_eq!(report.records, 1);
    }
}
