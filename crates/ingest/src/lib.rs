//! Ingestion pipeline for rankstore
//!
//! This crate implements the clickthrough correlation pipeline on top of
//! the storage layer:
//! - [`ClickthroughBuffer`]: time-bounded impression/outcome correlation
//! - [`Importer`]: the bulk-import orchestrator (validate, re-sort,
//!   batched replay, staged transfer, flush/sync)
//! - Sources and sinks: in-memory and JSON-lines implementations of the
//!   narrow external interfaces

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod import;
pub mod sink;
pub mod source;
pub mod validate;

pub use buffer::{BufferConfig, BufferCounters, ClickthroughBuffer, PendingImpression};
pub use import::{FeatureUpdater, ImportConfig, ImportReport, Importer, NullUpdater};
pub use sink::{JsonLinesSink, TrainingSink, VecSink};
pub use source::{EventSource, JsonLinesSource, VecSource};
pub use validate::{OrderingValidator, OrderingViolation, TimestampOrderValidator};
