//! Core types for rankstore
//!
//! This crate defines the foundational types used throughout the system:
//! - Events: `Event`, `ImpressionEvent`, `OutcomeEvent`, `MetadataEvent`,
//!   `TrainingRecord` and the id newtypes
//! - `Scope`: the identifying dimension-set for a piece of aggregate state
//! - `StateDescriptor` / `FeatureMapping`: static metadata for derived state
//! - Codecs: typed value and sub-key codecs over bincode / raw encodings
//! - `StateValue`: the unified stored value enum
//! - `Error`: the error hierarchy
//!
//! It carries no I/O; backends and the import pipeline live in the sibling
//! crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod scope;
pub mod value;

pub use codec::{BeU64KeyCodec, BincodeCodec, CodecError, SubKeyCodec, Utf8KeyCodec, ValueCodec};
pub use descriptor::{
    DescriptorError, FeatureMapping, StateDescriptor, StateKind, MAX_NAME_BYTES,
    PENDING_CLICKTHROUGH_STATE, RESERVED_PREFIX,
};
pub use error::{Error, Result};
pub use event::{
    Event, EventId, ImpressionEvent, ItemId, MetadataEvent, OutcomeEvent, RequestId,
    TrainingRecord, UserId,
};
pub use scope::{Scope, ScopeError, DIMENSION_SEPARATOR, GLOBAL_SEGMENT, VALUE_SEPARATOR};
pub use value::StateValue;
