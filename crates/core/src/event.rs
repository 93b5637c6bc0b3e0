//! Ranking event model
//!
//! This module defines the events the import pipeline consumes and the
//! training record it produces:
//! - `ImpressionEvent`: a ranked response was served for a request
//! - `OutcomeEvent`: a later interaction (click, purchase, ...) correlated
//!   back to a request
//! - `MetadataEvent`: user/item attribute updates that feed feature state
//!   but never join a clickthrough
//!
//! Events carry event-time timestamps; all windowing in the pipeline is
//! event-time, never wall clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a new random EventId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an EventId from a string representation
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a ranking request, assigned by the serving layer
///
/// Impressions and outcomes referring to the same request share this id;
/// it is the join key of the clickthrough buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap a serving-layer request identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wrap a user identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap an item identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ranked response was served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpressionEvent {
    /// Event identifier
    pub id: EventId,
    /// Ranking request this impression answers
    pub request: RequestId,
    /// Event-time timestamp
    pub timestamp: DateTime<Utc>,
    /// User the ranking was served to
    pub user: UserId,
    /// Items in ranked order
    pub items: Vec<ItemId>,
}

/// A later interaction correlated back to a ranking request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeEvent {
    /// Event identifier
    pub id: EventId,
    /// Ranking request the interaction belongs to
    pub request: RequestId,
    /// Event-time timestamp
    pub timestamp: DateTime<Utc>,
    /// Item the user interacted with
    pub item: ItemId,
    /// Interaction type, e.g. `"click"` or `"purchase"`
    pub interaction: String,
}

/// User or item attribute update
///
/// Feeds feature state only; carries no request id and never joins a
/// clickthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEvent {
    /// Event identifier
    pub id: EventId,
    /// Event-time timestamp
    pub timestamp: DateTime<Utc>,
    /// User the attributes belong to, if any
    pub user: Option<UserId>,
    /// Item the attributes belong to, if any
    pub item: Option<ItemId>,
    /// Attribute name/value pairs
    pub fields: HashMap<String, String>,
}

/// Discriminated ranking event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// A ranked response was served
    Impression(ImpressionEvent),
    /// An interaction arrived for an earlier request
    Outcome(OutcomeEvent),
    /// Attribute update with no request correlation
    Metadata(MetadataEvent),
}

impl Event {
    /// Event identifier
    pub fn id(&self) -> EventId {
        match self {
            Event::Impression(e) => e.id,
            Event::Outcome(e) => e.id,
            Event::Metadata(e) => e.id,
        }
    }

    /// Event-time timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::Impression(e) => e.timestamp,
            Event::Outcome(e) => e.timestamp,
            Event::Metadata(e) => e.timestamp,
        }
    }

    /// Request id for events that carry one
    pub fn request(&self) -> Option<&RequestId> {
        match self {
            Event::Impression(e) => Some(&e.request),
            Event::Outcome(e) => Some(&e.request),
            Event::Metadata(_) => None,
        }
    }
}

/// One emitted training unit: an impression joined with its outcomes
///
/// Immutable once emitted; ownership passes to the training-record sink.
/// `outcomes` is empty when the impression expired without a matching
/// interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    /// Request the record was built from
    pub request: RequestId,
    /// Timestamp of the originating impression
    pub timestamp: DateTime<Utc>,
    /// User the ranking was served to
    pub user: UserId,
    /// Items in the ranked order that was served
    pub items: Vec<ItemId>,
    /// Correlated outcomes in timestamp order; empty if none arrived in the
    /// retention window
    pub outcomes: Vec<OutcomeEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_event_accessors() {
        let imp = Event::Impression(ImpressionEvent {
            id: EventId::new(),
            request: RequestId::new("r1"),
            timestamp: ts(100),
            user: UserId::new("u1"),
            items: vec![ItemId::new("a"), ItemId::new("b")],
        });
        assert_eq!(imp.timestamp(), ts(100));
        assert_eq!(imp.request().unwrap().as_str(), "r1");

        let meta = Event::Metadata(MetadataEvent {
            id: EventId::new(),
            timestamp: ts(200),
            user: None,
            item: Some(ItemId::new("a")),
            fields: HashMap::new(),
        });
        assert!(meta.request().is_none());
    }

    #[test]
    fn test_request_id_ordering_is_lexicographic() {
        // Used by deterministic test fixtures; pin it.
        assert!(RequestId::new("a") < RequestId::new("b"));
    }

    #[test]
    fn test_event_serde_round_trip() {
        let event = Event::Outcome(OutcomeEvent {
            id: EventId::new(),
            request: RequestId::new("r9"),
            timestamp: ts(42),
            item: ItemId::new("item-3"),
            interaction: "click".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_event_id_from_string() {
        let id = EventId::new();
        let parsed = EventId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(EventId::from_string("not-a-uuid").is_none());
    }
}
