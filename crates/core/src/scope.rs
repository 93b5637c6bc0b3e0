//! Scopes: the identifying dimension-set for a piece of aggregate state
//!
//! A scope names *what* state is about (a user, an item, a user x item
//! pair) as an ordered set of `(dimension, value)` pairs. Scopes are built
//! per lookup and never persisted as objects; only their encoding survives,
//! as a key segment inside a backend keyspace.
//!
//! ## Encoding contract
//!
//! The encoding must be deterministic and collision-free: dimension order is
//! fixed by the state descriptor (not by insertion order), and both
//! dimension names and values are escaped so user-supplied identifiers
//! containing the separator characters cannot forge a key that collides
//! with a different scope. Scopes with no dimensions encode as the literal
//! segment `global`, which cannot collide with a dimension pair because
//! pairs always contain an (unescaped) `=`.

use crate::event::{ItemId, UserId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Separator between dimension pairs inside a scope segment
pub const DIMENSION_SEPARATOR: char = '/';

/// Separator between a dimension name and its value
pub const VALUE_SEPARATOR: char = '=';

/// Segment used for dimensionless (global) scopes
pub const GLOBAL_SEGMENT: &str = "global";

/// Errors raised when a scope does not fit a descriptor's dimensions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    /// The descriptor declares a dimension the scope does not carry
    #[error("scope is missing dimension '{dimension}'")]
    MissingDimension {
        /// The declared dimension that was not supplied
        dimension: String,
    },

    /// The scope carries a dimension the descriptor does not declare
    #[error("scope carries undeclared dimension '{dimension}'")]
    UndeclaredDimension {
        /// The supplied dimension that is not declared
        dimension: String,
    },
}

/// Ordered set of `(dimension, value)` pairs identifying a piece of state
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    dims: SmallVec<[(String, String); 2]>,
}

impl Scope {
    /// The dimensionless global scope
    pub fn global() -> Self {
        Self::default()
    }

    /// Scope over a single user
    pub fn user(user: &UserId) -> Self {
        Self::global().with("user", user.as_str())
    }

    /// Scope over a single item
    pub fn item(item: &ItemId) -> Self {
        Self::global().with("item", item.as_str())
    }

    /// Scope over a user x item pair
    pub fn user_item(user: &UserId, item: &ItemId) -> Self {
        Self::global()
            .with("user", user.as_str())
            .with("item", item.as_str())
    }

    /// Add a dimension value
    pub fn with(mut self, dimension: impl Into<String>, value: impl Into<String>) -> Self {
        self.dims.push((dimension.into(), value.into()));
        self
    }

    /// Number of dimensions carried
    pub fn len(&self) -> usize {
        self.dims.len()
    }

    /// Whether this is the global (dimensionless) scope
    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Value of a dimension, if carried
    pub fn get(&self, dimension: &str) -> Option<&str> {
        self.dims
            .iter()
            .find(|(d, _)| d == dimension)
            .map(|(_, v)| v.as_str())
    }

    /// Encode this scope as a key segment, in the dimension order declared
    /// by a descriptor
    ///
    /// The declared order wins over insertion order, so two call sites that
    /// built the same scope in different orders produce identical segments.
    /// Fails if the scope and the declared dimensions are not the same set.
    pub fn encode_for(&self, declared: &[String]) -> Result<String, ScopeError> {
        for (dim, _) in &self.dims {
            if !declared.iter().any(|d| d == dim) {
                return Err(ScopeError::UndeclaredDimension {
                    dimension: dim.clone(),
                });
            }
        }

        if declared.is_empty() {
            return Ok(GLOBAL_SEGMENT.to_string());
        }

        let mut out = String::new();
        for (i, dim) in declared.iter().enumerate() {
            let value = self.get(dim).ok_or_else(|| ScopeError::MissingDimension {
                dimension: dim.clone(),
            })?;
            if i > 0 {
                out.push(DIMENSION_SEPARATOR);
            }
            escape_into(dim, &mut out);
            out.push(VALUE_SEPARATOR);
            escape_into(value, &mut out);
        }
        Ok(out)
    }
}

/// Escape a dimension name or value into `out`
///
/// `%`, `/` and `=` are replaced by their `%XX` hex forms so the encoded
/// segment can be split on the raw separators without ambiguity.
fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            DIMENSION_SEPARATOR => out.push_str("%2F"),
            VALUE_SEPARATOR => out.push_str("%3D"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_global_scope_encodes_as_literal() {
        let seg = Scope::global().encode_for(&[]).unwrap();
        assert_eq!(seg, "global");
    }

    #[test]
    fn test_declared_order_wins_over_insertion_order() {
        let declared = dims(&["user", "item"]);
        let a = Scope::global().with("user", "u1").with("item", "i1");
        let b = Scope::global().with("item", "i1").with("user", "u1");
        assert_eq!(
            a.encode_for(&declared).unwrap(),
            b.encode_for(&declared).unwrap()
        );
    }

    #[test]
    fn test_missing_dimension_is_an_error() {
        let declared = dims(&["user", "item"]);
        let scope = Scope::global().with("user", "u1");
        assert_eq!(
            scope.encode_for(&declared),
            Err(ScopeError::MissingDimension {
                dimension: "item".to_string()
            })
        );
    }

    #[test]
    fn test_undeclared_dimension_is_an_error() {
        let declared = dims(&["user"]);
        let scope = Scope::global().with("user", "u1").with("session", "s1");
        assert_eq!(
            scope.encode_for(&declared),
            Err(ScopeError::UndeclaredDimension {
                dimension: "session".to_string()
            })
        );
    }

    #[test]
    fn test_separator_in_value_cannot_forge_a_collision() {
        // A value containing "/item=" must not encode like a two-dimension
        // scope.
        let one = dims(&["user"]);
        let two = dims(&["user", "item"]);

        let forged = Scope::global().with("user", "u1/item=i1");
        let honest = Scope::global().with("user", "u1").with("item", "i1");

        assert_ne!(
            forged.encode_for(&one).unwrap(),
            honest.encode_for(&two).unwrap()
        );
    }

    #[test]
    fn test_escape_is_injective_on_adjacent_pairs() {
        let declared = dims(&["a", "b"]);
        // ("x=", "y") vs ("x", "=y") must differ.
        let left = Scope::global().with("a", "x=").with("b", "y");
        let right = Scope::global().with("a", "x").with("b", "=y");
        assert_ne!(
            left.encode_for(&declared).unwrap(),
            right.encode_for(&declared).unwrap()
        );
    }

    #[test]
    fn test_percent_is_escaped() {
        let declared = dims(&["user"]);
        // Raw '%' must not be confusable with an escape sequence.
        let a = Scope::global().with("user", "%2F");
        let b = Scope::global().with("user", "/");
        assert_ne!(
            a.encode_for(&declared).unwrap(),
            b.encode_for(&declared).unwrap()
        );
    }

    #[test]
    fn test_get_returns_inserted_value() {
        let scope = Scope::user(&UserId::new("alice"));
        assert_eq!(scope.get("user"), Some("alice"));
        assert_eq!(scope.get("item"), None);
    }

    proptest! {
        #[test]
        fn prop_distinct_values_encode_distinctly(
            u1 in ".{0,24}",
            u2 in ".{0,24}",
            item in ".{0,24}",
        ) {
            prop_assume!(u1 != u2);
            let declared = dims(&["user", "item"]);
            let a = Scope::global().with("user", u1).with("item", item.clone());
            let b = Scope::global().with("user", u2).with("item", item);
            prop_assert_ne!(
                a.encode_for(&declared).unwrap(),
                b.encode_for(&declared).unwrap()
            );
        }

        #[test]
        fn prop_encoding_is_deterministic(value in ".{0,64}") {
            let declared = dims(&["user"]);
            let a = Scope::global().with("user", value.clone());
            let b = Scope::global().with("user", value);
            prop_assert_eq!(
                a.encode_for(&declared).unwrap(),
                b.encode_for(&declared).unwrap()
            );
        }
    }
}
