//! State descriptors and the feature mapping
//!
//! A `StateDescriptor` is the static metadata naming one piece of derived
//! state: its name, its shape (single value vs. keyed mapping) and the
//! scope dimensions its keys are built from. Descriptors are created once
//! at startup from the `FeatureMapping`, are immutable, and are shared by
//! every backend.
//!
//! ## Name rules
//!
//! Descriptor names become the leading segment of every stored key, so
//! they are validated up front: non-empty, no `/`, no NUL, at most
//! [`MAX_NAME_BYTES`] bytes. Names starting with the reserved prefix
//! [`RESERVED_PREFIX`] are pipeline-internal and rejected in user mappings.

use crate::scope::{Scope, ScopeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved prefix for pipeline-internal state names
pub const RESERVED_PREFIX: &str = "_ct";

/// Maximum descriptor name length in bytes
pub const MAX_NAME_BYTES: usize = 128;

/// Name of the internal mapping holding pending clickthroughs
pub const PENDING_CLICKTHROUGH_STATE: &str = "_ct.pending";

/// Descriptor and mapping validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// Name is empty
    #[error("state name cannot be empty")]
    EmptyName,

    /// Name contains a forbidden character
    #[error("state name '{name}' cannot contain '{forbidden}'")]
    ForbiddenCharacter {
        /// The offending name
        name: String,
        /// The character that is not allowed
        forbidden: char,
    },

    /// Name exceeds [`MAX_NAME_BYTES`]
    #[error("state name '{name}' exceeds {MAX_NAME_BYTES} bytes")]
    NameTooLong {
        /// The offending name
        name: String,
    },

    /// Name uses the reserved pipeline-internal prefix
    #[error("state name '{name}' uses reserved prefix '{RESERVED_PREFIX}'")]
    ReservedName {
        /// The offending name
        name: String,
    },

    /// Two descriptors in one mapping share a name
    #[error("duplicate state name '{name}' in feature mapping")]
    DuplicateName {
        /// The duplicated name
        name: String,
    },

    /// A scope dimension is invalid
    #[error("state '{name}': invalid scope dimension '{dimension}'")]
    InvalidDimension {
        /// Descriptor the dimension belongs to
        name: String,
        /// The offending dimension
        dimension: String,
    },

    /// A scope dimension is declared twice
    #[error("state '{name}': duplicate scope dimension '{dimension}'")]
    DuplicateDimension {
        /// Descriptor the dimension belongs to
        name: String,
        /// The duplicated dimension
        dimension: String,
    },
}

/// Shape of a piece of state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// One value per (descriptor, scope)
    Value,
    /// Arbitrary sub-keys per (descriptor, scope)
    Mapping,
}

/// Static metadata naming one piece of derived state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDescriptor {
    name: String,
    kind: StateKind,
    scope_dims: Vec<String>,
}

impl StateDescriptor {
    /// Declare single-value state
    pub fn value(
        name: impl Into<String>,
        scope_dims: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, DescriptorError> {
        Self::new(name.into(), StateKind::Value, scope_dims)
    }

    /// Declare keyed mapping state
    pub fn mapping(
        name: impl Into<String>,
        scope_dims: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, DescriptorError> {
        Self::new(name.into(), StateKind::Mapping, scope_dims)
    }

    fn new(
        name: String,
        kind: StateKind,
        scope_dims: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, DescriptorError> {
        validate_name(&name)?;
        let mut dims: Vec<String> = Vec::new();
        for dim in scope_dims {
            let dim = dim.into();
            validate_dimension(&name, &dim)?;
            if dims.contains(&dim) {
                return Err(DescriptorError::DuplicateDimension {
                    name,
                    dimension: dim,
                });
            }
            dims.push(dim);
        }
        Ok(Self {
            name,
            kind,
            scope_dims: dims,
        })
    }

    /// Descriptor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape of the state
    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// Declared scope dimensions, in key order
    pub fn scope_dims(&self) -> &[String] {
        &self.scope_dims
    }

    /// Keyspace prefix owned by this descriptor
    ///
    /// The trailing separator keeps scans from bleeding into descriptors
    /// whose name shares a prefix with this one (`ctr` vs `ctr_total`).
    pub fn key_prefix(&self) -> String {
        let mut prefix = self.name.clone();
        prefix.push('/');
        prefix
    }

    /// Build the scoped key segment for this descriptor
    ///
    /// Output is `name "/" scope-segment`; mapping state appends the
    /// encoded sub-key after one more separator.
    pub fn scope_key(&self, scope: &Scope) -> Result<String, ScopeError> {
        let segment = scope.encode_for(&self.scope_dims)?;
        let mut key = self.key_prefix();
        key.push_str(&segment);
        Ok(key)
    }
}

fn validate_name(name: &str) -> Result<(), DescriptorError> {
    if name.is_empty() {
        return Err(DescriptorError::EmptyName);
    }
    for forbidden in ['/', '\x00'] {
        if name.contains(forbidden) {
            return Err(DescriptorError::ForbiddenCharacter {
                name: name.to_string(),
                forbidden,
            });
        }
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(DescriptorError::NameTooLong {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn validate_dimension(name: &str, dim: &str) -> Result<(), DescriptorError> {
    if dim.is_empty() || dim.contains(['/', '=', '%', '\x00']) {
        return Err(DescriptorError::InvalidDimension {
            name: name.to_string(),
            dimension: dim.to_string(),
        });
    }
    Ok(())
}

/// The set of state descriptors a store is opened with
///
/// Supplied once at startup. Construction validates the user descriptors
/// and appends the pipeline-internal pending-clickthrough mapping, so every
/// store carries it and bulk transfer moves it along with feature state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMapping {
    states: Vec<StateDescriptor>,
}

impl FeatureMapping {
    /// Build a mapping from user state descriptors
    pub fn new(states: Vec<StateDescriptor>) -> Result<Self, DescriptorError> {
        for (i, descriptor) in states.iter().enumerate() {
            if descriptor.name().starts_with(RESERVED_PREFIX) {
                return Err(DescriptorError::ReservedName {
                    name: descriptor.name().to_string(),
                });
            }
            if states[..i].iter().any(|d| d.name() == descriptor.name()) {
                return Err(DescriptorError::DuplicateName {
                    name: descriptor.name().to_string(),
                });
            }
        }

        let mut states = states;
        states.push(StateDescriptor {
            name: PENDING_CLICKTHROUGH_STATE.to_string(),
            kind: StateKind::Mapping,
            scope_dims: Vec::new(),
        });
        Ok(Self { states })
    }

    /// Look up a descriptor by name
    pub fn get(&self, name: &str) -> Option<&StateDescriptor> {
        self.states.iter().find(|d| d.name() == name)
    }

    /// All descriptors, internal ones included
    pub fn states(&self) -> &[StateDescriptor] {
        &self.states
    }
}
