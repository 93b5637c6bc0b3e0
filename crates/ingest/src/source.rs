//! Event sources
//!
//! The importer pulls events from an [`EventSource`] until exhaustion.
//! Sources yield events in the order the producer claims; ordering is
//! verified (and repaired) downstream by the importer, not here.

use async_trait::async_trait;
use rankstore_core::{CodecError, Event, Result};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

/// Pull-based event stream
#[async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` at end of stream
    async fn next_event(&mut self) -> Result<Option<Event>>;
}

/// In-memory source over a prepared event list
#[derive(Debug)]
pub struct VecSource {
    events: std::vec::IntoIter<Event>,
}

impl VecSource {
    /// Source yielding `events` in order
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events: events.into_iter(),
        }
    }
}

#[async_trait]
impl EventSource for VecSource {
    async fn next_event(&mut self) -> Result<Option<Event>> {
        Ok(self.events.next())
    }
}

/// Reads one JSON event per line
///
/// The bulk-import file format: each line is one serialized [`Event`].
/// A malformed line is a hard failure naming the line number; it does not
/// skip silently.
pub struct JsonLinesSource {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl JsonLinesSource {
    /// Open the file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).await?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

#[async_trait]
impl EventSource for JsonLinesSource {
    async fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line).map_err(|e| {
                CodecError::Decode(format!("event file line {}: {e}", self.line_no))
            })?;
            return Ok(Some(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rankstore_core::{EventId, ImpressionEvent, RequestId, UserId};
    use std::io::Write;

    fn impression(request: &str, secs: i64) -> Event {
        Event::Impression(ImpressionEvent {
            id: EventId::new(),
            request: RequestId::new(request),
            timestamp: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
            user: UserId::new("u1"),
            items: vec![],
        })
    }

    #[tokio::test]
    async fn test_vec_source_yields_in_order() {
        let mut source = VecSource::new(vec![impression("a", 1), impression("b", 2)]);
        assert_eq!(
            source.next_event().await.unwrap().unwrap().request().unwrap().as_str(),
            "a"
        );
        assert_eq!(
            source.next_event().await.unwrap().unwrap().request().unwrap().as_str(),
            "b"
        );
        assert!(source.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_lines_source_reads_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "{}", serde_json::to_string(&impression("a", 1)).unwrap()).unwrap();
            writeln!(file).unwrap();
            writeln!(file, "{}", serde_json::to_string(&impression("b", 2)).unwrap()).unwrap();
        }

        let mut source = JsonLinesSource::open(&path).await.unwrap();
        let mut count = 0;
        while let Some(_event) = source.next_event().await.unwrap() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_json_lines_source_fails_on_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, "not-json\n").unwrap();

        let mut source = JsonLinesSource::open(&path).await.unwrap();
        let err = source.next_event().await.unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
