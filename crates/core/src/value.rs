//! Stored state values
//!
//! `StateValue` is the unified value enum for derived aggregate state.
//! Feature computation (out of scope here) decides what a value *means*;
//! this module only fixes the representable shapes and their serialized
//! form.
//!
//! Different variants are never equal, even when numerically equivalent:
//! `Int(1) != Float(1.0)`. Float equality follows IEEE-754.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unified value type for derived feature state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    /// Boolean flag
    Bool(bool),
    /// 64-bit signed integer (counters, totals)
    Int(i64),
    /// 64-bit float (rates, scalar aggregates)
    Float(f64),
    /// UTF-8 string (categorical attributes)
    Text(String),
    /// Numeric vector (windowed aggregates, embeddings)
    FloatList(Vec<f64>),
    /// String list (recent items, categorical sets)
    TextList(Vec<String>),
    /// Event-time instant (last-seen markers)
    Timestamp(DateTime<Utc>),
}

impl StateValue {
    /// Integer value, if this is `Int`
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StateValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Float value, if this is `Float`
    pub fn as_float(&self) -> Option<f64> {
        match self {
            StateValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String slice, if this is `Text`
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Timestamp, if this is `Timestamp`
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            StateValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}
