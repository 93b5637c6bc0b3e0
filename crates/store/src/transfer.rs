//! Size estimation and bulk transfer
//!
//! Both operations walk the keyspace one descriptor at a time, using the
//! per-descriptor prefix; the deterministic scope encoding guarantees a
//! prefix never matches another descriptor's entries, so nothing is
//! double-counted or copied twice.
//!
//! `transfer` copies raw bytes, with no decode/re-encode round trip, so a
//! staging backend written by one codec version can be uploaded by another
//! without skew. Writes are unconditional overwrites, which makes an
//! interrupted transfer safe to re-run: the destination converges to the
//! same state as a single successful run.

use crate::backend::Backend;
use rankstore_core::{FeatureMapping, Result};
use std::time::{Duration, Instant};
use tracing::info;

/// Entries moved per destination write batch
pub const TRANSFER_BATCH: usize = 1024;

/// Storage footprint of one descriptor's namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSize {
    /// Descriptor name
    pub state: String,
    /// Live entries under the descriptor prefix
    pub entries: u64,
    /// Total key bytes
    pub key_bytes: u64,
    /// Total value bytes
    pub value_bytes: u64,
}

/// Per-descriptor storage footprint of a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeEstimate {
    /// One row per descriptor in mapping order
    pub states: Vec<DescriptorSize>,
}

impl SizeEstimate {
    /// Row for one descriptor, if present
    pub fn get(&self, state: &str) -> Option<&DescriptorSize> {
        self.states.iter().find(|s| s.state == state)
    }

    /// Entries across all descriptors
    pub fn total_entries(&self) -> u64 {
        self.states.iter().map(|s| s.entries).sum()
    }

    /// Key plus value bytes across all descriptors
    pub fn total_bytes(&self) -> u64 {
        self.states
            .iter()
            .map(|s| s.key_bytes + s.value_bytes)
            .sum()
    }
}

/// Compute the per-descriptor footprint of `backend`
///
/// Operational visibility only; nothing downstream depends on it for
/// correctness.
pub async fn estimate_size(backend: &dyn Backend, mapping: &FeatureMapping) -> Result<SizeEstimate> {
    let mut states = Vec::with_capacity(mapping.states().len());
    for descriptor in mapping.states() {
        let entries = backend
            .scan_prefix(descriptor.key_prefix().as_bytes())
            .await?;
        let mut size = DescriptorSize {
            state: descriptor.name().to_string(),
            entries: entries.len() as u64,
            key_bytes: 0,
            value_bytes: 0,
        };
        for (key, value) in &entries {
            size.key_bytes += key.len() as u64;
            size.value_bytes += value.len() as u64;
        }
        states.push(size);
    }
    Ok(SizeEstimate { states })
}

/// Outcome counts of a bulk transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Entries copied
    pub entries: u64,
    /// Key plus value bytes copied
    pub bytes: u64,
    /// Wall-clock duration of the copy
    pub elapsed: Duration,
}

/// Copy every entry of every descriptor from `source` to `destination`
///
/// Raw byte copy in batches of [`TRANSFER_BATCH`]; idempotent on re-run.
pub async fn transfer(
    source: &dyn Backend,
    destination: &dyn Backend,
    mapping: &FeatureMapping,
) -> Result<TransferReport> {
    let started = Instant::now();
    let mut report = TransferReport {
        entries: 0,
        bytes: 0,
        elapsed: Duration::ZERO,
    };

    for descriptor in mapping.states() {
        let entries = source
            .scan_prefix(descriptor.key_prefix().as_bytes())
            .await?;
        let count = entries.len();
        for chunk in entries.chunks(TRANSFER_BATCH) {
            destination.put_batch(chunk).await?;
            report.entries += chunk.len() as u64;
            report.bytes += chunk
                .iter()
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum::<u64>();
        }
        info!(
            state = descriptor.name(),
            entries = count,
            "transferred descriptor namespace"
        );
    }

    report.elapsed = started.elapsed();
    info!(
        entries = report.entries,
        bytes = report.bytes,
        elapsed_ms = report.elapsed.as_millis() as u64,
        from = %source.kind(),
        to = %destination.kind(),
        "bulk transfer finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapBackend;
    use rankstore_core::{FeatureMapping, StateDescriptor};

    fn mapping() -> FeatureMapping {
        FeatureMapping::new(vec![
            StateDescriptor::value("ctr", ["user"]).unwrap(),
            StateDescriptor::value("ctr_total", ["user"]).unwrap(),
        ])
        .unwrap()
    }

    async fn seeded_source() -> HeapBackend {
        let source = HeapBackend::new();
        source.put(b"ctr/user=u1", b"a").await.unwrap();
        source.put(b"ctr/user=u2", b"bb").await.unwrap();
        source.put(b"ctr_total/user=u1", b"ccc").await.unwrap();
        source
    }

    #[tokio::test]
    async fn test_estimate_does_not_double_count_shared_prefixes() {
        let source = seeded_source().await;
        let estimate = estimate_size(&source, &mapping()).await.unwrap();

        let ctr = estimate.get("ctr").unwrap();
        assert_eq!(ctr.entries, 2);
        assert_eq!(ctr.value_bytes, 3);

        let total = estimate.get("ctr_total").unwrap();
        assert_eq!(total.entries, 1);
        assert_eq!(estimate.total_entries(), 3);
    }

    #[tokio::test]
    async fn test_transfer_copies_exact_bytes() {
        let source = seeded_source().await;
        let destination = HeapBackend::new();

        let report = transfer(&source, &destination, &mapping()).await.unwrap();
        assert_eq!(report.entries, 3);
        assert_eq!(
            destination.get(b"ctr/user=u2").await.unwrap(),
            Some(b"bb".to_vec())
        );
        assert_eq!(
            destination.get(b"ctr_total/user=u1").await.unwrap(),
            Some(b"ccc".to_vec())
        );
    }

    #[tokio::test]
    async fn test_transfer_twice_is_idempotent() {
        let source = seeded_source().await;
        let destination = HeapBackend::new();

        transfer(&source, &destination, &mapping()).await.unwrap();
        let first = destination.scan_prefix(b"").await.unwrap();

        transfer(&source, &destination, &mapping()).await.unwrap();
        let second = destination.scan_prefix(b"").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(destination.len(), 3);
    }

    #[tokio::test]
    async fn test_transfer_overwrites_stale_destination_entries() {
        let source = seeded_source().await;
        let destination = HeapBackend::new();
        destination.put(b"ctr/user=u1", b"stale").await.unwrap();

        transfer(&source, &destination, &mapping()).await.unwrap();
        assert_eq!(
            destination.get(b"ctr/user=u1").await.unwrap(),
            Some(b"a".to_vec())
        );
    }
}
