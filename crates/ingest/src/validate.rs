//! Stream ordering validation
//!
//! The validator runs over the materialized stream before replay and
//! reports violations. The importer reacts structurally to exactly one
//! kind, a timestamp inversion, by re-sorting the whole stream in memory.
//! Everything else a richer rule catalog might report is informational.

use chrono::{DateTime, Utc};
use rankstore_core::Event;

/// One violation found in the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderingViolation {
    /// Event at `position` has a timestamp earlier than its predecessor
    TimestampInversion {
        /// Zero-based position of the offending event
        position: usize,
        /// Timestamp of the preceding event
        prev: DateTime<Utc>,
        /// Timestamp of the offending event
        next: DateTime<Utc>,
    },
}

/// Validates a materialized event stream
pub trait OrderingValidator: Send + Sync {
    /// All violations, in stream order
    fn validate(&self, events: &[Event]) -> Vec<OrderingViolation>;
}

/// Checks that timestamps never move backwards
///
/// Equal timestamps are fine; only strict inversions are violations.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampOrderValidator;

impl OrderingValidator for TimestampOrderValidator {
    fn validate(&self, events: &[Event]) -> Vec<OrderingViolation> {
        let mut violations = Vec::new();
        for (position, pair) in events.windows(2).enumerate() {
            let prev = pair[0].timestamp();
            let next = pair[1].timestamp();
            if next < prev {
                violations.push(OrderingViolation::TimestampInversion {
                    position: position + 1,
                    prev,
                    next,
                });
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rankstore_core::{EventId, ImpressionEvent, RequestId, UserId};

    fn impression(secs: i64) -> Event {
        Event::Impression(ImpressionEvent {
            id: EventId::new(),
            request: RequestId::new(format!("r{secs}")),
            timestamp: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
            user: UserId::new("u1"),
            items: vec![],
        })
    }

    #[test]
    fn test_ordered_stream_has_no_violations() {
        let events = vec![impression(1), impression(2), impression(2), impression(3)];
        assert!(TimestampOrderValidator.validate(&events).is_empty());
    }

    #[test]
    fn test_inversion_is_reported_with_position() {
        let events = vec![impression(1), impression(5), impression(3)];
        let violations = TimestampOrderValidator.validate(&events);
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0],
            OrderingViolation::TimestampInversion { position: 2, .. }
        ));
    }

    #[test]
    fn test_empty_and_single_streams_are_trivially_ordered() {
        assert!(TimestampOrderValidator.validate(&[]).is_empty());
        assert!(TimestampOrderValidator.validate(&[impression(1)]).is_empty());
    }
}
