//! Clickthrough buffer
//!
//! Correlates impressions with later outcomes inside an event-time
//! retention window and emits one training record per impression: with the
//! matching outcome when it arrives in time, with an empty outcome set when
//! the window elapses or the buffer is flushed.
//!
//! Per request id the entry moves through exactly one terminal transition:
//! matched (outcome arrived), or expired (window elapsed, capacity
//! pressure, or final flush). Duplicate impressions and outcomes for
//! unknown requests are expected in a partial view of traffic; both are
//! counted, neither is an error.
//!
//! Pending impressions live in two places: an in-memory index driving
//! window/capacity eviction, and the reserved pending mapping of the store
//! the buffer is attached to. The store copy is authoritative: attaching a
//! buffer to a store with persisted pending entries resumes them, and a
//! staged import carries them to the remote backend along with feature
//! state.

use crate::sink::TrainingSink;
use chrono::{DateTime, Duration, Utc};
use rankstore_core::{
    BincodeCodec, ImpressionEvent, ItemId, OutcomeEvent, RequestId, Result, Scope, TrainingRecord,
    UserId, Utf8KeyCodec, PENDING_CLICKTHROUGH_STATE,
};
use rankstore_store::{MappingState, Store};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Buffer tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Event-time retention window in milliseconds
    pub retention_ms: u64,
    /// Maximum pending impressions before oldest-first forced expiry
    pub max_pending: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            retention_ms: 30 * 60 * 1_000,
            max_pending: 100_000,
        }
    }
}

/// An impression waiting for its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingImpression {
    /// Request the impression answered
    pub request: RequestId,
    /// Impression event-time
    pub timestamp: DateTime<Utc>,
    /// User the ranking was served to
    pub user: UserId,
    /// Items in served order
    pub items: Vec<ItemId>,
}

/// Counters exposed after an import
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferCounters {
    /// Impressions accepted as new pending entries
    pub impressions: u64,
    /// Outcomes that matched a pending impression
    pub matched_outcomes: u64,
    /// Impressions dropped because their request id was already pending
    pub duplicate_impressions: u64,
    /// Outcomes dropped because no pending impression matched
    pub unmatched_outcomes: u64,
    /// Entries expired by window elapse or final flush
    pub expired: u64,
    /// Entries force-expired by the capacity bound
    pub capacity_evictions: u64,
    /// Training records emitted
    pub emitted: u64,
}

enum ExpireReason {
    Window,
    Capacity,
    Flush,
}

/// Time-bounded impression/outcome correlation buffer
pub struct ClickthroughBuffer {
    retention: Duration,
    max_pending: usize,
    pending: MappingState<Utf8KeyCodec, BincodeCodec<PendingImpression>>,
    index: FxHashMap<RequestId, DateTime<Utc>>,
    by_time: BTreeSet<(DateTime<Utc>, RequestId)>,
    watermark: Option<DateTime<Utc>>,
    counters: BufferCounters,
    sink: Arc<dyn TrainingSink>,
}

impl ClickthroughBuffer {
    /// Attach a buffer to `store`, resuming any persisted pending entries
    pub async fn attach(
        store: &Store,
        sink: Arc<dyn TrainingSink>,
        config: &BufferConfig,
    ) -> Result<Self> {
        let pending = store.mapping_state(
            PENDING_CLICKTHROUGH_STATE,
            Utf8KeyCodec,
            BincodeCodec::<PendingImpression>::new(),
        )?;

        let mut index = FxHashMap::default();
        let mut by_time = BTreeSet::new();
        let mut watermark = None;
        for (_, record) in pending.entries(&Scope::global()).await? {
            index.insert(record.request.clone(), record.timestamp);
            by_time.insert((record.timestamp, record.request));
            watermark = watermark.max(Some(record.timestamp));
        }
        if !index.is_empty() {
            debug!(resumed = index.len(), "resumed persisted pending impressions");
        }

        Ok(Self {
            retention: Duration::milliseconds(config.retention_ms as i64),
            max_pending: config.max_pending,
            pending,
            index,
            by_time,
            watermark,
            counters: BufferCounters::default(),
            sink,
        })
    }

    /// Counters accumulated since attach
    pub fn counters(&self) -> &BufferCounters {
        &self.counters
    }

    /// Pending impressions currently held
    pub fn pending_len(&self) -> usize {
        self.index.len()
    }

    /// Record an impression; first write per request id wins
    pub async fn on_impression(&mut self, event: &ImpressionEvent) -> Result<()> {
        self.advance(event.timestamp).await?;

        if self.index.contains_key(&event.request) {
            self.counters.duplicate_impressions += 1;
            debug!(request = %event.request, "duplicate impression ignored");
            return Ok(());
        }

        let record = PendingImpression {
            request: event.request.clone(),
            timestamp: event.timestamp,
            user: event.user.clone(),
            items: event.items.clone(),
        };
        self.pending
            .put(&Scope::global(), &event.request.as_str().to_string(), &record)
            .await?;
        self.index.insert(event.request.clone(), event.timestamp);
        self.by_time.insert((event.timestamp, event.request.clone()));
        self.counters.impressions += 1;

        self.enforce_capacity().await
    }

    /// Correlate an outcome; outcomes without a pending impression are
    /// counted and dropped
    pub async fn on_outcome(&mut self, event: &OutcomeEvent) -> Result<()> {
        self.advance(event.timestamp).await?;

        let Some(timestamp) = self.index.get(&event.request).copied() else {
            self.counters.unmatched_outcomes += 1;
            debug!(request = %event.request, "outcome without pending impression dropped");
            return Ok(());
        };

        let record = self.take(timestamp, event.request.clone()).await?;
        match record {
            Some(pending) => {
                self.counters.matched_outcomes += 1;
                self.emit(pending, vec![event.clone()]).await
            }
            None => {
                // Index said pending but the store had no record; treat the
                // outcome as unmatched rather than fabricating a record.
                warn!(request = %event.request, "pending impression missing from store");
                self.counters.unmatched_outcomes += 1;
                Ok(())
            }
        }
    }

    /// Force every remaining entry to expiry
    ///
    /// Called at end of import / shutdown so no impression is silently
    /// lost.
    pub async fn flush_all(&mut self) -> Result<()> {
        while let Some((timestamp, request)) = self.by_time.iter().next().cloned() {
            self.expire(timestamp, request, ExpireReason::Flush).await?;
        }
        Ok(())
    }

    /// Move the event-time watermark forward and expire aged entries
    async fn advance(&mut self, timestamp: DateTime<Utc>) -> Result<()> {
        self.watermark = self.watermark.max(Some(timestamp));
        let Some(watermark) = self.watermark else {
            return Ok(());
        };
        let cutoff = watermark - self.retention;
        while let Some((timestamp, request)) = self.by_time.iter().next().cloned() {
            if timestamp > cutoff {
                break;
            }
            self.expire(timestamp, request, ExpireReason::Window).await?;
        }
        Ok(())
    }

    /// Expire oldest entries until within the capacity bound
    async fn enforce_capacity(&mut self) -> Result<()> {
        while self.index.len() > self.max_pending {
            let Some((timestamp, request)) = self.by_time.iter().next().cloned() else {
                break;
            };
            self.expire(timestamp, request, ExpireReason::Capacity).await?;
        }
        Ok(())
    }

    /// Remove one entry from the index and the store, returning its record
    async fn take(
        &mut self,
        timestamp: DateTime<Utc>,
        request: RequestId,
    ) -> Result<Option<PendingImpression>> {
        let key = request.as_str().to_string();
        let record = self.pending.get(&Scope::global(), &key).await?;
        self.pending.delete(&Scope::global(), &key).await?;
        self.index.remove(&request);
        self.by_time.remove(&(timestamp, request));
        Ok(record)
    }

    async fn expire(
        &mut self,
        timestamp: DateTime<Utc>,
        request: RequestId,
        reason: ExpireReason,
    ) -> Result<()> {
        match reason {
            ExpireReason::Window | ExpireReason::Flush => self.counters.expired += 1,
            ExpireReason::Capacity => self.counters.capacity_evictions += 1,
        }
        match self.take(timestamp, request.clone()).await? {
            Some(pending) => self.emit(pending, Vec::new()).await,
            None => {
                warn!(request = %request, "expired impression missing from store");
                Ok(())
            }
        }
    }

    async fn emit(
        &mut self,
        pending: PendingImpression,
        outcomes: Vec<OutcomeEvent>,
    ) -> Result<()> {
        let record = TrainingRecord {
            request: pending.request,
            timestamp: pending.timestamp,
            user: pending.user,
            items: pending.items,
            outcomes,
        };
        self.sink.deliver(record).await?;
        self.counters.emitted += 1;
        Ok(())
    }
}
