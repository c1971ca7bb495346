//! MsgPack codec using `rmp-serde`.
//!
//! Always uses `to_vec_named`: structs are written as maps keyed by field
//! name, which keeps every frame self-describing. `to_vec` would write them
//! as positional arrays and tie both ends to identical field order.
//!
//! # Example
//!
//! ```
//! use wirepool::codec::{Codec, MsgPackCodec};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct ReqGetInfo {
//!     username: String,
//!     token: String,
//! }
//!
//! let req = ReqGetInfo { username: "alice".to_string(), token: "t0k".to_string() };
//! let encoded = MsgPackCodec::encode(&req).unwrap();
//! let decoded: ReqGetInfo = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, req);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Codec;
use crate::error::Result;

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map format).
    #[inline]
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    #[inline]
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
