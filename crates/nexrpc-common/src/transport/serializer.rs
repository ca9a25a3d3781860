use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::protocol::error::{Result, RpcError};

/// Payload serializer plugins, identified on the wire by a numeric code.
///
/// Every plugin is symmetric: whatever `serialize` produces, `deserialize`
/// accepts when given the same target type. The target Rust type plays the
/// role of the type hint, so the plugins need no self-describing format.
///
/// # Example
///
/// ```
/// use nexrpc_common::transport::Serializer;
///
/// let bytes = Serializer::Postcard.serialize(&(42u32, "hi".to_string())).unwrap();
/// let (n, s): (u32, String) = Serializer::Postcard.deserialize(&bytes).unwrap();
/// assert_eq!((n, s.as_str()), (42, "hi"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Serializer {
    /// Compact binary-object encoding (bincode)
    #[default]
    Bincode,
    /// Human-readable JSON (serde_json)
    Json,
    /// Varint binary encoding (postcard)
    Postcard,
}

impl Serializer {
    /// All built-in plugins, in code order.
    pub const ALL: [Serializer; 3] = [Serializer::Bincode, Serializer::Json, Serializer::Postcard];

    /// Numeric code written into the frame header.
    pub fn code(&self) -> u32 {
        match self {
            Serializer::Bincode => 0,
            Serializer::Json => 1,
            Serializer::Postcard => 2,
        }
    }

    /// Looks up a built-in plugin by code.
    pub fn from_code(code: u32) -> Option<Self> {
        Serializer::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Serializer::Bincode => "bincode",
            Serializer::Json => "json",
            Serializer::Postcard => "postcard",
        }
    }

    /// Encodes a value into bytes.
    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Serializer::Bincode => Ok(bincode::serialize(value)?),
            Serializer::Json => Ok(serde_json::to_vec(value)?),
            Serializer::Postcard => Ok(postcard::to_allocvec(value)?),
        }
    }

    /// Decodes a value of type `T` from bytes.
    pub fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        match self {
            Serializer::Bincode => Ok(bincode::deserialize(data)?),
            Serializer::Json => Ok(serde_json::from_slice(data)?),
            Serializer::Postcard => Ok(postcard::from_bytes(data)?),
        }
    }
}

impl fmt::Display for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Serializer {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.parse::<u32>() {
            return Serializer::from_code(code).ok_or(RpcError::SerializerNotFound(code));
        }
        Serializer::ALL
            .into_iter()
            .find(|ser| ser.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| RpcError::InvalidRequest(format!("Unknown serializer '{}'", s)))
    }
}

/// Lookup table from serializer code to plugin.
///
/// Built once at startup and shared read-only afterwards (wrap it in an
/// `Arc` to hand it to several connections).
#[derive(Debug, Clone)]
pub struct SerializerRegistry {
    plugins: HashMap<u32, Serializer>,
}

impl SerializerRegistry {
    /// Creates a registry holding every built-in plugin.
    pub fn new() -> Self {
        let plugins = Serializer::ALL.into_iter().map(|s| (s.code(), s)).collect();
        Self { plugins }
    }

    /// Creates a registry that accepts only the given plugins.
    pub fn with_plugins(plugins: impl IntoIterator<Item = Serializer>) -> Self {
        let plugins = plugins.into_iter().map(|s| (s.code(), s)).collect();
        Self { plugins }
    }

    /// Returns the plugin registered under `code`, if any.
    pub fn get(&self, code: u32) -> Option<Serializer> {
        self.plugins.get(&code).copied()
    }

    /// Like [`get`](Self::get), but maps a miss to [`RpcError::SerializerNotFound`].
    pub fn require(&self, code: u32) -> Result<Serializer> {
        self.get(code).ok_or(RpcError::SerializerNotFound(code))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: i32,
        tags: Vec<String>,
        score: Option<f64>,
    }

    #[test]
    fn test_every_plugin_round_trips_structs() {
        let sample = Sample {
            id: 7,
            tags: vec!["a".into(), "b".into()],
            score: Some(0.5),
        };

        for serializer in Serializer::ALL {
            let bytes = serializer.serialize(&sample).unwrap();
            let decoded: Sample = serializer.deserialize(&bytes).unwrap();
            assert_eq!(decoded, sample, "round trip through {}", serializer);
        }
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Serializer::Bincode.code(), 0);
        assert_eq!(Serializer::Json.code(), 1);
        assert_eq!(Serializer::Postcard.code(), 2);
        assert_eq!(Serializer::from_code(1), Some(Serializer::Json));
        assert_eq!(Serializer::from_code(9), None);
    }

    #[test]
    fn test_parse_by_name_or_code() {
        assert_eq!("json".parse::<Serializer>().unwrap(), Serializer::Json);
        assert_eq!("Postcard".parse::<Serializer>().unwrap(), Serializer::Postcard);
        assert_eq!("0".parse::<Serializer>().unwrap(), Serializer::Bincode);
        assert!("kryo".parse::<Serializer>().is_err());
        assert!(matches!(
            "3".parse::<Serializer>(),
            Err(RpcError::SerializerNotFound(3))
        ));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = SerializerRegistry::new();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(2), Some(Serializer::Postcard));
        assert!(registry.get(3).is_none());
        assert!(matches!(
            registry.require(42),
            Err(RpcError::SerializerNotFound(42))
        ));
    }

    #[test]
    fn test_restricted_registry() {
        let registry = SerializerRegistry::with_plugins([Serializer::Json]);
        assert_eq!(registry.get(1), Some(Serializer::Json));
        assert!(registry.get(0).is_none());
    }

    #[test]
    fn test_deserialize_garbage_fails() {
        let result: Result<Sample> = Serializer::Json.deserialize(&[0xFF, 0x00]);
        assert_eq!(result.unwrap_err().kind(), crate::protocol::ErrorKind::Serialization);
    }
}
