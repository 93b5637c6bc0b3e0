//! Typed codecs for stored state
//!
//! Every value passing through the storage layer goes through a codec, and
//! every mapping sub-key goes through a sub-key codec. Codecs must
//! round-trip exactly: `decode(encode(v)) == v` for every representable
//! value, and decoding malformed bytes fails with a [`CodecError`] rather
//! than silently producing a default.
//!
//! The concrete stack is bincode for values (the serialization stack the
//! rest of the system already carries) and raw UTF-8 / big-endian integer
//! encodings for sub-keys.

use byteorder::{BigEndian, ByteOrder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use thiserror::Error;

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Value could not be serialized
    #[error("encode error: {0}")]
    Encode(String),

    /// Bytes could not be decoded into the expected value type
    #[error("decode error: {0}")]
    Decode(String),

    /// Input shorter than the fixed-width encoding requires
    #[error("truncated input: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes the encoding requires
        expected: usize,
        /// Bytes actually supplied
        actual: usize,
    },
}

/// Typed value codec
///
/// Implementations must be `Send + Sync`; one codec instance is shared by
/// every backend that stores the descriptor it belongs to.
pub trait ValueCodec: Send + Sync {
    /// The value type this codec represents
    type Value;

    /// Encode a value for storage
    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>, CodecError>;

    /// Decode stored bytes
    ///
    /// Malformed bytes are a hard failure of the read operation; they must
    /// not corrupt surrounding state.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Value, CodecError>;
}

/// Sub-key codec for mapping state
///
/// Sub-keys become the tail segment of the stored key, so the encoding must
/// be deterministic; it does not need to be printable.
pub trait SubKeyCodec: Send + Sync {
    /// The sub-key type this codec represents
    type Key;

    /// Encode a sub-key into key-tail bytes
    fn encode_key(&self, key: &Self::Key) -> Vec<u8>;

    /// Decode key-tail bytes back into a sub-key
    fn decode_key(&self, bytes: &[u8]) -> Result<Self::Key, CodecError>;
}

/// Bincode-backed value codec for any serde type
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    /// Create a codec instance
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BincodeCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> ValueCodec for BincodeCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// UTF-8 string sub-keys
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8KeyCodec;

impl SubKeyCodec for Utf8KeyCodec {
    type Key = String;

    fn encode_key(&self, key: &String) -> Vec<u8> {
        key.as_bytes().to_vec()
    }

    fn decode_key(&self, bytes: &[u8]) -> Result<String, CodecError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Big-endian `u64` sub-keys
///
/// Big-endian so that byte order equals numeric order under prefix scans.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeU64KeyCodec;

impl SubKeyCodec for BeU64KeyCodec {
    type Key = u64;

    fn encode_key(&self, key: &u64) -> Vec<u8> {
        let mut buf = vec![0u8; 8];
        BigEndian::write_u64(&mut buf, *key);
        buf
    }

    fn decode_key(&self, bytes: &[u8]) -> Result<u64, CodecError> {
        if bytes.len() != 8 {
            return Err(CodecError::Truncated {
                expected: 8,
                actual: bytes.len(),
            });
        }
        Ok(BigEndian::read_u64(bytes))
    }
}
