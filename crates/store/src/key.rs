//! Stored key layout
//!
//! A full key is `descriptor-name "/" scope-segment` for value state, with
//! `"/" sub-key-bytes` appended for mapping state. Descriptor names cannot
//! contain `/` and scope segments escape it, so the descriptor segment can
//! always be recovered by splitting on the first separator, and the
//! per-descriptor prefix `name "/"` never matches another descriptor's
//! keys.

use rankstore_core::scope::ScopeError;
use rankstore_core::{Scope, StateDescriptor};
use std::fmt;

/// Separator between key segments
pub const KEY_SEPARATOR: u8 = b'/';

/// A full backend key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey(Vec<u8>);

impl StoreKey {
    /// Key for single-value state under `descriptor` + `scope`
    pub fn for_value(descriptor: &StateDescriptor, scope: &Scope) -> Result<Self, ScopeError> {
        Ok(Self(descriptor.scope_key(scope)?.into_bytes()))
    }

    /// Key for one mapping entry under `descriptor` + `scope` + `sub_key`
    pub fn for_entry(
        descriptor: &StateDescriptor,
        scope: &Scope,
        sub_key: &[u8],
    ) -> Result<Self, ScopeError> {
        let mut bytes = descriptor.scope_key(scope)?.into_bytes();
        bytes.push(KEY_SEPARATOR);
        bytes.extend_from_slice(sub_key);
        Ok(Self(bytes))
    }

    /// Key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for StoreKey {
    /// Lossy UTF-8 rendering for diagnostics; sub-key tails may be binary
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Prefix owned by a descriptor, as bytes
pub fn descriptor_prefix(descriptor: &StateDescriptor) -> Vec<u8> {
    descriptor.key_prefix().into_bytes()
}

/// Split a full key into its descriptor segment and the remainder
///
/// Returns `None` for keys that carry no separator (never produced by this
/// crate).
pub fn split_descriptor(key: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = key.iter().position(|&b| b == KEY_SEPARATOR)?;
    Some((&key[..pos], &key[pos + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rankstore_core::StateDescriptor;

    fn user_ctr() -> StateDescriptor {
        StateDescriptor::value("ctr", ["user"]).unwrap()
    }

    #[test]
    fn test_value_key_layout() {
        let key = StoreKey::for_value(&user_ctr(), &Scope::global().with("user", "u1")).unwrap();
        assert_eq!(key.as_bytes(), b"ctr/user=u1");
    }

    #[test]
    fn test_entry_key_layout() {
        let d = StateDescriptor::mapping("seen", ["user"]).unwrap();
        let key =
            StoreKey::for_entry(&d, &Scope::global().with("user", "u1"), b"item-9").unwrap();
        assert_eq!(key.as_bytes(), b"seen/user=u1/item-9");
    }

    #[test]
    fn test_split_descriptor() {
        let key = StoreKey::for_value(&user_ctr(), &Scope::global().with("user", "u1")).unwrap();
        let (name, rest) = split_descriptor(key.as_bytes()).unwrap();
        assert_eq!(name, b"ctr");
        assert_eq!(rest, b"user=u1");
        assert!(split_descriptor(b"no-separator").is_none());
    }

    #[test]
    fn test_prefix_matches_own_keys_only() {
        let ctr = user_ctr();
        let ctr_total = StateDescriptor::value("ctr_total", ["user"]).unwrap();
        let prefix = descriptor_prefix(&ctr);
        let own = StoreKey::for_value(&ctr, &Scope::global().with("user", "u1")).unwrap();
        let other =
            StoreKey::for_value(&ctr_total, &Scope::global().with("user", "u1")).unwrap();
        assert!(own.as_bytes().starts_with(&prefix));
        assert!(!other.as_bytes().starts_with(&prefix));
    }
}
