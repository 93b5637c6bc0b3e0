//! Rankstore - feature-state store and clickthrough import pipeline for
//! real-time ranking
//!
//! Rankstore ingests ranking events (impressions, interactions, metadata),
//! maintains derived aggregate state behind a uniform key/value store
//! abstraction, and produces training records pairing each ranking request
//! with its eventual outcome.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use rankstore::{
//!     BackendConfig, FeatureMapping, ImportConfig, Importer, NullUpdater,
//!     StateDescriptor, Store, VecSink, VecSource,
//! };
//!
//! let mapping = FeatureMapping::new(vec![
//!     StateDescriptor::value("ctr", ["user"])?,
//! ])?;
//! let store = Store::open(&BackendConfig::disk("/var/lib/rankstore/state.redb"), &mapping).await?;
//!
//! let sink = Arc::new(VecSink::new());
//! let importer = Importer::new(Arc::new(NullUpdater), sink.clone());
//! let report = importer.run(&store, VecSource::new(events), &ImportConfig::default()).await?;
//! println!("{} events, {} training records", report.events, report.records);
//! ```
//!
//! # Architecture
//!
//! Three layers, re-exported here:
//! - `rankstore-core`: events, scopes, state descriptors, codecs, errors
//! - `rankstore-store`: the `Backend` trait with heap / disk / redis
//!   implementations, typed state handles, size estimation, bulk transfer
//! - `rankstore-ingest`: the clickthrough buffer and the import
//!   orchestrator

pub use rankstore_core::*;
pub use rankstore_ingest::*;
pub use rankstore_store::*;
