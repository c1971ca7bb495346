//! Codec module - serialization/deserialization for envelopes and payloads.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (default)
//! - [`JsonCodec`] - JSON using `serde_json`
//!
//! # Design
//!
//! Codecs are marker structs implementing [`Codec`] with static methods.
//! Server and client are generic over the codec type, so both ends of a
//! connection agree on the encoding at compile time.
//!
//! # Example
//!
//! ```
//! use wirepool::codec::{Codec, JsonCodec, MsgPackCodec};
//!
//! let encoded = MsgPackCodec::encode(&"hello").unwrap();
//! let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//!
//! let json = JsonCodec::encode(&vec![1, 2, 3]).unwrap();
//! assert_eq!(json, b"[1,2,3]");
//! ```

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// A self-describing structured encoding shared by both ends of a connection.
///
/// Encoding failures map to [`RpcError::Encode`](crate::RpcError::Encode),
/// decoding failures to [`RpcError::Decode`](crate::RpcError::Decode).
pub trait Codec: Send + Sync + 'static {
    /// Encode a value to bytes.
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>>;

    /// Decode bytes into a value of type `T`.
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T>;
}
