use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::protocol::error::Result;

/// Codec negotiated per connection, selected by name in the handshake
/// [`Options`](crate::Options) record.
///
/// Two formats are registered: self-describing JSON (the default) and
/// postcard's compact binary encoding. The enum allows further formats to be
/// added without touching the framing layer.
///
/// # Example
///
/// ```
/// use minirpc_common::Encoding;
///
/// let encoding = Encoding::from_name("json").unwrap();
/// let bytes = encoding.encode(&("hello", 7)).unwrap();
/// let value: (String, u32) = encoding.decode(&bytes).unwrap();
/// assert_eq!(value, ("hello".to_string(), 7));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Postcard,
}

impl Encoding {
    /// Looks a codec up by its negotiated name.
    pub fn from_name(name: &str) -> Option<Encoding> {
        match name {
            "json" => Some(Encoding::Json),
            "postcard" => Some(Encoding::Postcard),
            _ => None,
        }
    }

    /// The name this codec negotiates under.
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Json => "json",
            Encoding::Postcard => "postcard",
        }
    }

    /// Encodes a value to its wire bytes.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Encoding::Json => Ok(serde_json::to_vec(value)?),
            Encoding::Postcard => Ok(postcard::to_allocvec(value)?),
        }
    }

    /// Decodes a value from its wire bytes.
    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        match self {
            Encoding::Json => Ok(serde_json::from_slice(data)?),
            Encoding::Postcard => Ok(postcard::from_bytes(data)?),
        }
    }
}
