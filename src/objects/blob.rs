//! Blob: an opaque byte payload (§3).
//!
//! Simplified from the teacher's `Blob` (`src/artifacts/objects/blob.rs`),
//! which stores content as a `String` with an attached file mode; this
//! store's blobs are raw bytes (payload encoding is PayloadHandlers'
//! concern, §4.5) and carry no mode (mode lives on the owning tree entry).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    content: Vec<u8>,
}

impl Blob {
    pub fn new(content: Vec<u8>) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    pub fn decode(content: &[u8]) -> Self {
        Self::new(content.to_vec())
    }
}
