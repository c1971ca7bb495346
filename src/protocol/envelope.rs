//! The logical unit exchanged over a connection.
//!
//! An [`Envelope`] pairs an operation name with an opaque payload. The
//! payload is itself codec-encoded (a request record on the way in, a
//! response record on the way out); the transport never looks inside it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{Result, RpcError};

/// Operation name plus serialized request or response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Registered operation name (never empty on the wire).
    pub name: String,
    /// Codec-encoded request or response record.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Create an envelope from an already encoded payload.
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Create an envelope by encoding `value` with codec `C`.
    pub fn wrap<C: Codec, T: Serialize>(name: impl Into<String>, value: &T) -> Result<Self> {
        Ok(Self::new(name, C::encode(value)?))
    }

    /// Decode the payload into `T` with codec `C`.
    pub fn unwrap_payload<C: Codec, T: DeserializeOwned>(&self) -> Result<T> {
        C::decode(&self.payload)
    }

    /// Serialize the whole envelope into a frame body.
    pub fn to_body<C: Codec>(&self) -> Result<Vec<u8>> {
        if self.name.is_empty() {
            return Err(RpcError::Encode("envelope name is empty".to_string()));
        }
        C::encode(self)
    }

    /// Deserialize a frame body into an envelope.
    pub fn from_body<C: Codec>(body: &[u8]) -> Result<Self> {
        let envelope: Envelope = C::decode(body)?;
        if envelope.name.is_empty() {
            return Err(RpcError::Decode("envelope name is empty".to_string()));
        }
        Ok(envelope)
    }
}
