//! Dispatches a user value to/from blob bytes based on the path's filename
//! extension (§4.5).
//!
//! Grounded on the extension-dispatch shape the teacher's `Database`
//! hints at for serializable artifacts, generalized into an open registry
//! (§9's "two-method capability" design note) so a caller can register an
//! extra extension without touching `ObjectDB` or `WorkingTree`.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;
use std::collections::HashMap;

/// A decoded payload. `Structured` backs extensions with a lossless typed
/// round-trip (currently just `yml`); `Raw` is the identity/default handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Structured(YamlValue),
    Raw(Vec<u8>),
}

impl Payload {
    pub fn as_yaml(&self) -> Option<&YamlValue> {
        match self {
            Payload::Structured(v) => Some(v),
            Payload::Raw(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Raw(b) => Some(b),
            Payload::Structured(_) => None,
        }
    }

    pub fn from_serializable(value: &impl Serialize) -> Result<Self> {
        let yaml = serde_yaml::to_value(value)
            .map_err(|e| StoreError::MalformedObject(None, format!("payload not serializable: {e}")))?;
        Ok(Payload::Structured(yaml))
    }

    pub fn into_deserializable<T: for<'de> Deserialize<'de>>(self) -> Result<T> {
        match self {
            Payload::Structured(v) => serde_yaml::from_value(v)
                .map_err(|e| StoreError::MalformedObject(None, format!("payload not deserializable: {e}"))),
            Payload::Raw(_) => Err(StoreError::MalformedObject(
                None,
                "cannot deserialize a raw payload as structured data".into(),
            )),
        }
    }
}

/// One `encode`/`decode` pair keyed by extension, per §9's capability
/// registry design note.
pub trait PayloadHandler: Send + Sync {
    fn encode(&self, payload: &Payload) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Payload>;
}

struct YamlHandler;

impl PayloadHandler for YamlHandler {
    fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        let value = payload
            .as_yaml()
            .ok_or_else(|| StoreError::MalformedObject(None, "yml handler given a raw payload".into()))?;
        serde_yaml::to_string(value)
            .map(|s| s.into_bytes())
            .map_err(|e| StoreError::MalformedObject(None, format!("yaml encode failed: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Payload> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| StoreError::MalformedObject(None, "yaml payload is not valid utf-8".into()))?;
        serde_yaml::from_str(text)
            .map(Payload::Structured)
            .map_err(|e| StoreError::MalformedObject(None, format!("yaml decode failed: {e}")))
    }
}

struct RawHandler;

impl PayloadHandler for RawHandler {
    fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        match payload {
            Payload::Raw(bytes) => Ok(bytes.clone()),
            Payload::Structured(_) => Err(StoreError::MalformedObject(
                None,
                "raw handler given a structured payload".into(),
            )),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Payload> {
        Ok(Payload::Raw(bytes.to_vec()))
    }
}

/// Extension-keyed handler registry. Open for extension per §4.5/§9: a
/// caller may `register` additional extensions before opening a [`crate::Store`].
pub struct PayloadHandlers {
    handlers: HashMap<String, Box<dyn PayloadHandler>>,
}

impl PayloadHandlers {
    pub fn new() -> Self {
        let mut handlers: HashMap<String, Box<dyn PayloadHandler>> = HashMap::new();
        handlers.insert("yml".to_string(), Box::new(YamlHandler));
        Self { handlers }
    }

    pub fn register(&mut self, extension: impl Into<String>, handler: Box<dyn PayloadHandler>) {
        self.handlers.insert(extension.into(), handler);
    }

    /// The substring after the last `.` in the leaf (final path component),
    /// per §4.5; a leaf with no `.` dispatches to the default raw handler.
    pub fn extension_of(leaf: &str) -> Option<&str> {
        leaf.rsplit_once('.').map(|(_, ext)| ext)
    }

    fn handler_for(&self, leaf: &str) -> &dyn PayloadHandler {
        Self::extension_of(leaf)
            .and_then(|ext| self.handlers.get(ext))
            .map(|h| h.as_ref())
            .unwrap_or(&RawHandler)
    }

    pub fn encode(&self, leaf: &str, payload: &Payload) -> Result<Vec<u8>> {
        self.handler_for(leaf).encode(payload)
    }

    pub fn decode(&self, leaf: &str, bytes: &[u8]) -> Result<Payload> {
        self.handler_for(leaf).decode(bytes)
    }
}

impl Default for PayloadHandlers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yml_extension_round_trips_structured_value() {
        let handlers = PayloadHandlers::new();
        let payload = Payload::from_serializable(&42i64).unwrap();
        let bytes = handlers.encode("a.yml", &payload).unwrap();
        let decoded = handlers.decode("a.yml", &bytes).unwrap();
        assert_eq!(decoded.as_yaml().unwrap(), payload.as_yaml().unwrap());
    }

    #[test]
    fn default_extension_is_identity_on_bytes() {
        let handlers = PayloadHandlers::new();
        let payload = Payload::Raw(b"whatever bytes".to_vec());
        let bytes = handlers.encode("a.bin", &payload).unwrap();
        assert_eq!(bytes, b"whatever bytes");
        let decoded = handlers.decode("a.bin", &bytes).unwrap();
        assert_eq!(decoded.as_bytes().unwrap(), b"whatever bytes");
    }

    #[test]
    fn extension_is_substring_after_last_dot() {
        assert_eq!(PayloadHandlers::extension_of("a.b.yml"), Some("yml"));
        assert_eq!(PayloadHandlers::extension_of("noext"), None);
    }
}
