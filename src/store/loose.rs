//! Individually compressed objects under a content-addressed directory
//! (§4.2, §6).
//!
//! Grounded on the teacher's `Database::load`/`store`/`write_object`
//! (`src/areas/database.rs`): zlib compression via `flate2`, atomic
//! temp-file-then-rename writes, and idempotent no-op writes when the
//! target file already exists.

use crate::error::{Result, StoreError};
use crate::objects::{ObjectId, ObjectKind};
use sha1::{Digest, Sha1};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub struct LooseStore {
    root: PathBuf,
}

impl LooseStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &ObjectId) -> PathBuf {
        self.root.join(id.to_path())
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.path_for(id).exists()
    }

    /// Read and decompress the envelope at `id`'s content-addressed path,
    /// parse the `"<kind> <size>\0"` header, and return `(kind, content)`.
    pub fn read(&self, id: &ObjectId) -> Result<(ObjectKind, Vec<u8>)> {
        let path = self.path_for(id);
        let raw = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(id.clone())
            } else {
                StoreError::Io(e)
            }
        })?;

        let decompressed = Self::decompress(&raw, &path)?;

        let header_end = decompressed
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| StoreError::MalformedObject(Some(id.clone()), "missing header NUL".into()))?;
        let header = std::str::from_utf8(&decompressed[..header_end])
            .map_err(|_| StoreError::MalformedObject(Some(id.clone()), "non-utf8 header".into()))?;
        let (kind_str, size_str) = header
            .split_once(' ')
            .ok_or_else(|| StoreError::MalformedObject(Some(id.clone()), "malformed header".into()))?;
        let kind: ObjectKind = kind_str.parse()?;
        let size: usize = size_str
            .parse()
            .map_err(|_| StoreError::MalformedObject(Some(id.clone()), "invalid size field".into()))?;

        let content = decompressed[header_end + 1..].to_vec();
        if content.len() != size {
            return Err(StoreError::MalformedObject(
                Some(id.clone()),
                format!("declared size {size} but found {}", content.len()),
            ));
        }

        Ok((kind, content))
    }

    /// Write `content` under its content-addressed path, computing the id
    /// from `kind`+`content`. A no-op if the object already exists on disk
    /// (idempotent write, §4.2).
    pub fn write(&self, kind: ObjectKind, content: &[u8]) -> Result<ObjectId> {
        let id = crate::objects::ObjectCodec::id_for(kind, content)?;
        let path = self.path_for(&id);

        if path.exists() {
            return Ok(id);
        }

        let dir = path.parent().expect("content-addressed path always has a parent");
        std::fs::create_dir_all(dir)?;

        let mut envelope = format!("{} {}\0", kind.as_str(), content.len()).into_bytes();
        envelope.extend_from_slice(content);
        let compressed = Self::compress(&envelope)?;

        let temp_path = dir.join(format!("tmp-obj-{}", Self::random_suffix()));
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(&compressed)?;
        drop(file);
        std::fs::rename(&temp_path, &path)?;

        Ok(id)
    }

    fn compress(data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn decompress(data: &[u8], path: &Path) -> Result<Vec<u8>> {
        if data.len() < 2 || data[0] != 0x78 || (((data[0] as u16) << 8 | data[1] as u16) % 31 != 0) {
            return Err(StoreError::NotLooseObject(path.to_path_buf()));
        }
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn random_suffix() -> u32 {
        // Only needs to avoid colliding with other in-flight temp files, so
        // a timestamp/thread-id digest stands in for a PRNG dependency.
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        let mut hasher = Sha1::new();
        hasher.update(format!("{}{:?}", now.as_nanos(), std::thread::current().id()));
        let digest = hasher.finalize();
        u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All directories/files currently present, sharded by first hex byte,
    /// used by [`crate::store::object_db::ObjectDb`] ID-prefix lookups.
    pub fn iter_ids(&self) -> Result<Vec<ObjectId>> {
        let mut out = Vec::new();
        if !self.root.exists() {
            return Ok(out);
        }
        for shard in std::fs::read_dir(&self.root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            let shard_name = shard.file_name().to_string_lossy().to_string();
            if shard_name.len() != 2 {
                continue;
            }
            for entry in std::fs::read_dir(shard.path())? {
                let entry = entry?;
                let rest = entry.file_name().to_string_lossy().to_string();
                if let Ok(id) = ObjectId::try_parse(format!("{shard_name}{rest}")) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrip() {
        let dir = assert_fs::TempDir::new().unwrap();
        let store = LooseStore::new(dir.path());
        let id = store.write(ObjectKind::Blob, b"hello").unwrap();
        let (kind, content) = store.read(&id).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(content, b"hello");
    }

    #[test]
    fn write_is_idempotent() {
        let dir = assert_fs::TempDir::new().unwrap();
        let store = LooseStore::new(dir.path());
        let id1 = store.write(ObjectKind::Blob, b"same").unwrap();
        let id2 = store.write(ObjectKind::Blob, b"same").unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn missing_object_is_not_found() {
        let dir = assert_fs::TempDir::new().unwrap();
        let store = LooseStore::new(dir.path());
        let id = ObjectId::from_raw20(&[0u8; 20]).unwrap();
        assert!(matches!(store.read(&id), Err(StoreError::NotFound(_))));
    }
}
