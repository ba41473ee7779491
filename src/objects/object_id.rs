//! Content-addressed object identifier.
//!
//! Grounded on the teacher's `ObjectId` (`src/artifacts/objects/object_id.rs`):
//! a 40-char lowercase hex string with binary (`h40`) read/write helpers for
//! tree-entry encoding and a content-addressed path split.

use crate::error::{Result, StoreError};
use std::io;
use std::path::PathBuf;

pub const OBJECT_ID_HEX_LEN: usize = 40;
pub const OBJECT_ID_BYTE_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn try_parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.len() != OBJECT_ID_HEX_LEN {
            return Err(StoreError::MalformedObject(
                None,
                format!("invalid object id length: {}", id.len()),
            ));
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StoreError::MalformedObject(
                None,
                format!("invalid object id characters: {id}"),
            ));
        }
        Ok(Self(id.to_lowercase()))
    }

    pub fn from_raw20(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != OBJECT_ID_BYTE_LEN {
            return Err(StoreError::MalformedObject(
                None,
                format!("invalid raw object id length: {}", bytes.len()),
            ));
        }
        let hex = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self::try_parse(hex)
    }

    pub fn write_h40_to<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let hex = self.as_str();
        for i in (0..OBJECT_ID_HEX_LEN).step_by(2) {
            let byte = u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| StoreError::MalformedObject(None, "invalid hex digit".into()))?;
            writer.write_all(&[byte])?;
        }
        Ok(())
    }

    pub fn read_h40_from<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; OBJECT_ID_BYTE_LEN];
        reader.read_exact(&mut buf)?;
        Self::from_raw20(&buf)
    }

    /// `objects/<aa>/<bb...>` relative path, per §6.
    pub fn to_path(&self) -> PathBuf {
        let (dir, file) = self.0.split_at(2);
        PathBuf::from(dir).join(file)
    }

    pub fn to_short(&self) -> &str {
        &self.0[..7]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
