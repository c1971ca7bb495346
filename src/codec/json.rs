//! JSON codec using `serde_json`.
//!
//! Handy when the payloads should stay human readable on the wire. Byte
//! strings (the envelope payload) are written as arrays of numbers, so the
//! 9999-byte frame ceiling is reached sooner than with MessagePack.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Codec;
use crate::error::{Result, RpcError};

/// JSON codec for structured data.
pub struct JsonCodec;

impl Codec for JsonCodec {
    #[inline]
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| RpcError::Encode(e.to_string()))
    }

    #[inline]
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| RpcError::Decode(e.to_string()))
    }
}
