//! The single active branch pointer (§3 `Ref`, §6).
//!
//! Simplified from the teacher's `Refs` (`src/areas/refs.rs`), which also
//! handles symbolic refs and branch listing/deletion; this spec needs only
//! one head-ref file per branch, read and atomically replaced.

use crate::error::Result;
use crate::objects::ObjectId;
use std::path::{Path, PathBuf};

pub struct HeadRef {
    path: PathBuf,
}

impl HeadRef {
    pub fn new(git_dir: impl AsRef<Path>, branch: &str) -> Self {
        Self {
            path: git_dir.as_ref().join("refs").join("heads").join(branch),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut lock = self.path.clone().into_os_string();
        lock.push(".lock");
        PathBuf::from(lock)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Current tip commit id, or `None` for an empty repository (§3
    /// invariant 3: the head ref always points to a reachable commit, or
    /// is absent).
    pub fn read(&self) -> Result<Option<ObjectId>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(Some(ObjectId::try_parse(contents.trim().to_string())?))
    }

    /// Atomically replaces the ref file's contents with `id` followed by a
    /// newline, via temp-file-then-rename (§4.7 step 3).
    pub fn write(&self, id: &ObjectId) -> Result<()> {
        let dir = self.path.parent().expect("ref path always has a parent");
        std::fs::create_dir_all(dir)?;
        let temp_path = dir.join(format!(".{}.tmp", self.path.file_name().unwrap().to_string_lossy()));
        std::fs::write(&temp_path, format!("{id}\n"))?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
