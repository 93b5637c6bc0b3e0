//! Storage layer for rankstore
//!
//! This crate implements the uniform state abstraction and its three
//! interchangeable backends:
//! - `HeapBackend`: DashMap in-process cache (tests, staging)
//! - `DiskBackend`: redb embedded store (durable, single-node)
//! - `RedisBackend`: remote shared store (retried with backoff)
//!
//! On top of the byte-level [`Backend`] trait sit the typed
//! [`ValueState`]/[`MappingState`] handles, the [`Store`] facade, size
//! estimation and idempotent bulk [`transfer`](transfer::transfer), the
//! machinery behind staged imports.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod disk;
pub mod heap;
pub mod key;
pub mod remote;
pub mod retry;
pub mod state;
pub mod transfer;

pub use backend::{Backend, BackendKind};
pub use config::{open_backend, BackendConfig};
pub use disk::DiskBackend;
pub use heap::HeapBackend;
pub use key::StoreKey;
pub use remote::{RedisBackend, RemoteConfig};
pub use retry::{with_retry, RetryPolicy};
pub use state::{MappingState, StateOp, StateUpdate, Store, ValueState};
pub use transfer::{estimate_size, transfer, DescriptorSize, SizeEstimate, TransferReport};
