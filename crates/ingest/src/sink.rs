//! Training-record sinks
//!
//! The buffer guarantees effectively-once delivery per impression: every
//! impression produces exactly one record (with or without outcomes), and
//! no impression produces two. Sinks take ownership of emitted records.

use async_trait::async_trait;
use parking_lot::Mutex;
use rankstore_core::{Result, TrainingRecord};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Receives emitted training records
#[async_trait]
pub trait TrainingSink: Send + Sync {
    /// Take ownership of one finished record
    async fn deliver(&self, record: TrainingRecord) -> Result<()>;

    /// Flush any buffered records; called once at the end of an import
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory collecting sink for tests and small imports
#[derive(Debug, Default)]
pub struct VecSink {
    records: Mutex<Vec<TrainingRecord>>,
}

impl VecSink {
    /// Create an empty collecting sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records delivered so far
    pub fn records(&self) -> Vec<TrainingRecord> {
        self.records.lock().clone()
    }

    /// Number of records delivered so far
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no records were delivered
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl TrainingSink for VecSink {
    async fn deliver(&self, record: TrainingRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}

/// Appends records as JSON lines to a file
pub struct JsonLinesSink {
    writer: tokio::sync::Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Create or append to the file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .await?;
        Ok(Self {
            writer: tokio::sync::Mutex::new(BufWriter::new(file)),
        })
    }
}

#[async_trait]
impl TrainingSink for JsonLinesSink {
    async fn deliver(&self, record: TrainingRecord) -> Result<()> {
        let mut line = serde_json::to_vec(&record)
            .map_err(|e| rankstore_core::CodecError::Encode(e.to_string()))?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rankstore_core::{RequestId, UserId};

    fn record(request: &str) -> TrainingRecord {
        TrainingRecord {
            request: RequestId::new(request),
            timestamp: Utc::now(),
            user: UserId::new("u1"),
            items: vec![],
            outcomes: vec![],
        }
    }

    #[tokio::test]
    async fn test_vec_sink_collects_in_order() {
        let sink = VecSink::new();
        sink.deliver(record("a")).await.unwrap();
        sink.deliver(record("b")).await.unwrap();
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].request.as_str(), "a");
    }

    #[tokio::test]
    async fn test_json_lines_sink_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");

        let sink = JsonLinesSink::open(&path).await.unwrap();
        sink.deliver(record("a")).await.unwrap();
        sink.deliver(record("b")).await.unwrap();
        sink.flush().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: TrainingRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.request.as_str(), "a");
    }
}
