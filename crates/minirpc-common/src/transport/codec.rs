use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::protocol::error::{Result, RpcError};

/// Codec used for headers and bodies after the handshake.
///
/// Selected per connection by the `codec_type` field of
/// [`Options`](crate::Options). The string identifiers are what travels on
/// the wire.
///
/// # Example
///
/// ```
/// use minirpc_common::CodecType;
///
/// let codec = CodecType::Postcard;
/// let encoded = codec.encode(&(1u32, "two".to_string())).unwrap();
/// let decoded: (u32, String) = codec.decode(&encoded).unwrap();
/// assert_eq!(decoded, (1, "two".to_string()));
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CodecType {
    /// Compact binary encoding (default)
    #[default]
    #[serde(rename = "application/postcard")]
    Postcard,
    /// Self-describing JSON encoding
    #[serde(rename = "application/json")]
    Json,
}

impl CodecType {
    /// Wire identifier of this codec.
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecType::Postcard => "application/postcard",
            CodecType::Json => "application/json",
        }
    }

    /// Encode a value to bytes
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            CodecType::Postcard => Ok(postcard::to_stdvec(value)?),
            CodecType::Json => Ok(serde_json::to_vec(value)?),
        }
    }

    /// Decode a value from bytes
    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        match self {
            CodecType::Postcard => Ok(postcard::from_bytes(data)?),
            CodecType::Json => Ok(serde_json::from_slice(data)?),
        }
    }
}

impl fmt::Display for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodecType {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "application/postcard" => Ok(CodecType::Postcard),
            "application/json" => Ok(CodecType::Json),
            other => Err(RpcError::InvalidOptions(format!("invalid codec type {}", other))),
        }
    }
}
