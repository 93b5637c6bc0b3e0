//! Typed state handles and the store facade
//!
//! `ValueState` and `MappingState` are stateless facades over a backend:
//! they hold a descriptor, a codec and an `Arc` to the backend, and build
//! scoped keys per call. All mutation of feature state goes through these
//! handles (or through [`Store::apply`] for untyped replay updates), so the
//! backend is the single shared mutable resource.

use crate::backend::{Backend, BackendKind};
use crate::key::StoreKey;
use crate::transfer::{self, SizeEstimate};
use rankstore_core::{
    BincodeCodec, Error, FeatureMapping, Result, Scope, StateDescriptor, StateKind, StateValue,
    SubKeyCodec, Utf8KeyCodec, ValueCodec,
};
use std::sync::Arc;

/// Single-value state: one value per (descriptor, scope)
pub struct ValueState<C: ValueCodec> {
    backend: Arc<dyn Backend>,
    descriptor: StateDescriptor,
    codec: C,
}

impl<C: ValueCodec> ValueState<C> {
    pub(crate) fn new(backend: Arc<dyn Backend>, descriptor: StateDescriptor, codec: C) -> Self {
        Self {
            backend,
            descriptor,
            codec,
        }
    }

    /// Descriptor this handle addresses
    pub fn descriptor(&self) -> &StateDescriptor {
        &self.descriptor
    }

    /// Current value under `scope`, if any
    pub async fn get(&self, scope: &Scope) -> Result<Option<C::Value>> {
        let key = StoreKey::for_value(&self.descriptor, scope)?;
        match self.backend.get(key.as_bytes()).await? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Overwrite the value under `scope`
    pub async fn put(&self, scope: &Scope, value: &C::Value) -> Result<()> {
        let key = StoreKey::for_value(&self.descriptor, scope)?;
        let bytes = self.codec.encode(value)?;
        self.backend.put(key.as_bytes(), &bytes).await
    }

    /// Remove the value under `scope`; absence is not an error
    pub async fn delete(&self, scope: &Scope) -> Result<()> {
        let key = StoreKey::for_value(&self.descriptor, scope)?;
        self.backend.delete(key.as_bytes()).await
    }
}

/// Mapping state: arbitrary sub-keys per (descriptor, scope)
pub struct MappingState<K: SubKeyCodec, C: ValueCodec> {
    backend: Arc<dyn Backend>,
    descriptor: StateDescriptor,
    key_codec: K,
    codec: C,
}

impl<K: SubKeyCodec, C: ValueCodec> MappingState<K, C> {
    pub(crate) fn new(
        backend: Arc<dyn Backend>,
        descriptor: StateDescriptor,
        key_codec: K,
        codec: C,
    ) -> Self {
        Self {
            backend,
            descriptor,
            key_codec,
            codec,
        }
    }

    /// Descriptor this handle addresses
    pub fn descriptor(&self) -> &StateDescriptor {
        &self.descriptor
    }

    fn entry_key(&self, scope: &Scope, sub_key: &K::Key) -> Result<StoreKey> {
        let encoded = self.key_codec.encode_key(sub_key);
        Ok(StoreKey::for_entry(&self.descriptor, scope, &encoded)?)
    }

    /// Value under `scope` + `sub_key`, if any
    pub async fn get(&self, scope: &Scope, sub_key: &K::Key) -> Result<Option<C::Value>> {
        let key = self.entry_key(scope, sub_key)?;
        match self.backend.get(key.as_bytes()).await? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Overwrite the value under `scope` + `sub_key`
    pub async fn put(&self, scope: &Scope, sub_key: &K::Key, value: &C::Value) -> Result<()> {
        let key = self.entry_key(scope, sub_key)?;
        let bytes = self.codec.encode(value)?;
        self.backend.put(key.as_bytes(), &bytes).await
    }

    /// Remove the entry under `scope` + `sub_key`; absence is not an error
    pub async fn delete(&self, scope: &Scope, sub_key: &K::Key) -> Result<()> {
        let key = self.entry_key(scope, sub_key)?;
        self.backend.delete(key.as_bytes()).await
    }

    /// All entries under `scope`, decoded, in sub-key byte order
    pub async fn entries(&self, scope: &Scope) -> Result<Vec<(K::Key, C::Value)>> {
        let mut prefix = self.descriptor.scope_key(scope)?.into_bytes();
        prefix.push(b'/');
        let raw = self.backend.scan_prefix(&prefix).await?;
        let mut out = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            let tail = &key[prefix.len()..];
            out.push((self.key_codec.decode_key(tail)?, self.codec.decode(&value)?));
        }
        Ok(out)
    }
}

/// One replay-time state mutation produced by feature computation
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    /// Descriptor name the update addresses
    pub state: String,
    /// Scope the update addresses
    pub scope: Scope,
    /// Sub-key for mapping state; `None` for value state
    pub sub_key: Option<String>,
    /// Mutation to apply
    pub op: StateOp,
}

/// Mutation kind of a [`StateUpdate`]
#[derive(Debug, Clone, PartialEq)]
pub enum StateOp {
    /// Overwrite with a value
    Put(StateValue),
    /// Remove the addressed entry
    Delete,
}

impl StateUpdate {
    /// Overwrite value state
    pub fn put(state: impl Into<String>, scope: Scope, value: StateValue) -> Self {
        Self {
            state: state.into(),
            scope,
            sub_key: None,
            op: StateOp::Put(value),
        }
    }

    /// Overwrite one mapping entry
    pub fn put_keyed(
        state: impl Into<String>,
        scope: Scope,
        sub_key: impl Into<String>,
        value: StateValue,
    ) -> Self {
        Self {
            state: state.into(),
            scope,
            sub_key: Some(sub_key.into()),
            op: StateOp::Put(value),
        }
    }

    /// Remove value state
    pub fn delete(state: impl Into<String>, scope: Scope) -> Self {
        Self {
            state: state.into(),
            scope,
            sub_key: None,
            op: StateOp::Delete,
        }
    }
}

/// A ready store: one backend plus the feature mapping it was opened with
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
    mapping: Arc<FeatureMapping>,
}

impl Store {
    /// Wrap an already-constructed backend
    pub fn new(backend: Arc<dyn Backend>, mapping: FeatureMapping) -> Self {
        Self {
            backend,
            mapping: Arc::new(mapping),
        }
    }

    /// Which backend implementation this store runs on
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// The underlying byte-level backend
    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    /// The feature mapping this store was opened with
    pub fn mapping(&self) -> &FeatureMapping {
        &self.mapping
    }

    fn descriptor(&self, name: &str, kind: StateKind) -> Result<StateDescriptor> {
        let descriptor = self
            .mapping
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown state '{name}'")))?;
        if descriptor.kind() != kind {
            return Err(Error::Config(format!(
                "state '{name}' is declared as {:?}, not {:?}",
                descriptor.kind(),
                kind
            )));
        }
        Ok(descriptor.clone())
    }

    /// Typed handle for single-value state
    pub fn value_state<C: ValueCodec>(&self, name: &str, codec: C) -> Result<ValueState<C>> {
        let descriptor = self.descriptor(name, StateKind::Value)?;
        Ok(ValueState::new(Arc::clone(&self.backend), descriptor, codec))
    }

    /// Typed handle for mapping state
    pub fn mapping_state<K: SubKeyCodec, C: ValueCodec>(
        &self,
        name: &str,
        key_codec: K,
        codec: C,
    ) -> Result<MappingState<K, C>> {
        let descriptor = self.descriptor(name, StateKind::Mapping)?;
        Ok(MappingState::new(
            Arc::clone(&self.backend),
            descriptor,
            key_codec,
            codec,
        ))
    }

    /// Apply one replay update
    ///
    /// Replay updates use string sub-keys and [`StateValue`] values; typed
    /// handles exist for everything richer.
    pub async fn apply(&self, update: &StateUpdate) -> Result<()> {
        let descriptor = self
            .mapping
            .get(&update.state)
            .ok_or_else(|| Error::Config(format!("unknown state '{}'", update.state)))?;

        let key = match (descriptor.kind(), &update.sub_key) {
            (StateKind::Value, None) => StoreKey::for_value(descriptor, &update.scope)?,
            (StateKind::Mapping, Some(sub_key)) => {
                let encoded = Utf8KeyCodec.encode_key(sub_key);
                StoreKey::for_entry(descriptor, &update.scope, &encoded)?
            }
            (StateKind::Value, Some(_)) => {
                return Err(Error::Config(format!(
                    "state '{}' is value-shaped but the update carries a sub-key",
                    update.state
                )))
            }
            (StateKind::Mapping, None) => {
                return Err(Error::Config(format!(
                    "state '{}' is mapping-shaped but the update carries no sub-key",
                    update.state
                )))
            }
        };

        match &update.op {
            StateOp::Put(value) => {
                let bytes = BincodeCodec::<StateValue>::new().encode(value)?;
                self.backend.put(key.as_bytes(), &bytes).await
            }
            StateOp::Delete => self.backend.delete(key.as_bytes()).await,
        }
    }

    /// Make previously written entries durable (backend-dependent; see
    /// [`Backend::sync`])
    pub async fn sync(&self) -> Result<()> {
        self.backend.sync().await
    }

    /// Per-descriptor storage footprint of this store
    pub async fn estimate_size(&self) -> Result<SizeEstimate> {
        transfer::estimate_size(self.backend.as_ref(), &self.mapping).await
    }
}
