//! The four object kinds and their exact canonical byte encoding (§4.1).
//!
//! Generalizes the teacher's `Packable`/`Unpackable`/`Object` traits
//! (`src/artifacts/objects/object.rs`) into a single `ObjectCodec`
//! responsible for the `"<kind> <len>\0<content>"` envelope and the
//! SHA-1 id derivation, with a `Tag` kind added (the teacher has none).

mod blob;
mod commit;
mod object_id;
mod tag;
mod tree;

pub use blob::Blob;
pub use commit::Commit;
pub use object_id::{ObjectId, OBJECT_ID_BYTE_LEN, OBJECT_ID_HEX_LEN};
pub use tag::Tag;
pub use tree::{Tree, TreeEntry, TreeEntryMode};

use crate::error::{Result, StoreError};
use sha1::{Digest, Sha1};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(StoreError::UnknownKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A decoded object, type-erased the way the teacher's `ObjectBox` is.
#[derive(Debug, Clone)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
            Object::Tag(_) => ObjectKind::Tag,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Object::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Object::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Object::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Object::Tag(t) => Some(t),
            _ => None,
        }
    }
}

/// Bijection between in-memory objects and their canonical bytes, plus the
/// hash-id derivation. This is the crate's single source of truth for the
/// on-disk byte format described in §4.1 and §6.
pub struct ObjectCodec;

impl ObjectCodec {
    /// Serialize the object's content (without the `"<kind> <len>\0"` header).
    pub fn encode_content(object: &Object) -> Result<Vec<u8>> {
        match object {
            Object::Blob(b) => Ok(b.content().to_vec()),
            Object::Tree(t) => t.encode(),
            Object::Commit(c) => Ok(c.encode()),
            Object::Tag(t) => Ok(t.encode()),
        }
    }

    /// Produce the full envelope `"<kind> <len>\0<content>"` written to loose
    /// storage and matched against pack entries.
    pub fn encode(object: &Object) -> Result<(ObjectKind, Vec<u8>)> {
        let kind = object.kind();
        let content = Self::encode_content(object)?;
        Ok((kind, content))
    }

    pub fn decode(kind: ObjectKind, content: &[u8]) -> Result<Object> {
        Ok(match kind {
            ObjectKind::Blob => Object::Blob(Blob::decode(content)),
            ObjectKind::Tree => Object::Tree(Tree::decode(content)?),
            ObjectKind::Commit => Object::Commit(Commit::decode(content)?),
            ObjectKind::Tag => Object::Tag(Tag::decode(content)?),
        })
    }

    /// `SHA1("<kind> <len(content)>\0<content>")`, per Invariant 1 in §3.
    pub fn id_for(kind: ObjectKind, content: &[u8]) -> Result<ObjectId> {
        let mut hasher = Sha1::new();
        hasher.update(format!("{} {}\0", kind.as_str(), content.len()).as_bytes());
        hasher.update(content);
        let digest = hasher.finalize();
        ObjectId::try_parse(format!("{digest:x}"))
    }

    pub fn id_of(object: &Object) -> Result<ObjectId> {
        let (kind, content) = Self::encode(object)?;
        Self::id_for(kind, &content)
    }
}
