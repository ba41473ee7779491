//! A mutable in-memory overlay over a persistent [`Tree`], materialized
//! back into new `Tree`/`Blob` objects on [`WorkingTree::write`] (§4.6).
//!
//! The teacher has no analogous structure (its `Index` is a flat staging
//! list, not a tree mirror); this is built from §3's "WorkingTree node"
//! entity and §4.6's contract, in the teacher's own style of lazily
//! expanding on-disk structures only as a caller actually touches them
//! (the same laziness the teacher's `Database::load` affords by reading
//! one object per path component instead of the whole tree up front).

use crate::error::{Result, StoreError};
use crate::objects::{Blob, Object, ObjectId, Tree, TreeEntry, TreeEntryMode};
use crate::payload::{Payload, PayloadHandlers};
use crate::store::ObjectDb;
use std::collections::BTreeMap;

struct BlobNode {
    payload: Option<Payload>,
    id: Option<ObjectId>,
    mode: TreeEntryMode,
    dirty: bool,
}

impl BlobNode {
    fn from_existing(id: ObjectId, mode: TreeEntryMode) -> Self {
        Self {
            payload: None,
            id: Some(id),
            mode,
            dirty: false,
        }
    }

    fn ensure_payload(&mut self, db: &ObjectDb, handlers: &PayloadHandlers, leaf_name: &str) -> Result<()> {
        if self.payload.is_some() {
            return Ok(());
        }
        let id = self
            .id
            .as_ref()
            .expect("a blob node always has payload or a backing id");
        let (_, bytes) = db.read_raw(id)?;
        self.payload = Some(handlers.decode(leaf_name, &bytes)?);
        Ok(())
    }
}

enum Child {
    Blob(BlobNode),
    Tree(WorkingTree),
}

/// Mutable mirror of a persistent [`Tree`]. Expands its entry list lazily
/// from `ObjectDB` the first time it's traversed, so opening a store with a
/// large history doesn't eagerly decode every tree it has ever committed.
pub struct WorkingTree {
    id: Option<ObjectId>,
    entries: BTreeMap<String, Child>,
    loaded: bool,
    dirty: bool,
}

impl WorkingTree {
    pub fn empty() -> Self {
        Self {
            id: None,
            entries: BTreeMap::new(),
            loaded: true,
            dirty: false,
        }
    }

    /// Mirrors the tree at `id`, or an empty tree if `id` is `None` (a
    /// freshly initialized repository, per §3 invariant 3).
    pub fn from_root(id: Option<ObjectId>) -> Self {
        match id {
            None => Self::empty(),
            Some(id) => Self {
                id: Some(id),
                entries: BTreeMap::new(),
                loaded: false,
                dirty: false,
            },
        }
    }

    fn ensure_loaded(&mut self, db: &ObjectDb) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        let id = self.id.clone().expect("unloaded node always has a backing id");
        let object = db.get(&id)?;
        let tree = object
            .as_tree()
            .ok_or_else(|| StoreError::MalformedObject(Some(id.clone()), "expected a tree object".into()))?;
        for entry in tree.entries() {
            let child = if entry.mode.is_directory() {
                Child::Tree(WorkingTree::from_root(Some(entry.id.clone())))
            } else {
                Child::Blob(BlobNode::from_existing(entry.id.clone(), entry.mode))
            };
            self.entries.insert(entry.name.clone(), child);
        }
        self.loaded = true;
        Ok(())
    }

    fn split_path(path: &str) -> Result<Vec<&str>> {
        let components: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if components.is_empty() {
            return Err(StoreError::InvalidPath(path.to_string(), "path is empty".into()));
        }
        for component in &components {
            if component.contains('\0') {
                return Err(StoreError::InvalidPath(
                    path.to_string(),
                    "path component contains a NUL byte".into(),
                ));
            }
        }
        Ok(components)
    }

    pub fn get(&mut self, path: &str, db: &ObjectDb, handlers: &PayloadHandlers) -> Result<Option<Payload>> {
        let components = Self::split_path(path)?;
        self.get_rec(&components, db, handlers)
    }

    fn get_rec(
        &mut self,
        components: &[&str],
        db: &ObjectDb,
        handlers: &PayloadHandlers,
    ) -> Result<Option<Payload>> {
        self.ensure_loaded(db)?;
        let (head, rest) = components.split_first().expect("non-empty path");
        match self.entries.get_mut(*head) {
            None => Ok(None),
            Some(Child::Blob(blob)) if rest.is_empty() => {
                blob.ensure_payload(db, handlers, head)?;
                Ok(blob.payload.clone())
            }
            Some(Child::Blob(_)) => Ok(None),
            Some(Child::Tree(_)) if rest.is_empty() => Ok(None),
            Some(Child::Tree(subtree)) => subtree.get_rec(rest, db, handlers),
        }
    }

    pub fn set(&mut self, path: &str, payload: Payload, db: &ObjectDb) -> Result<()> {
        let components = Self::split_path(path)?;
        self.set_rec(&components, payload, db)
    }

    fn set_rec(&mut self, components: &[&str], payload: Payload, db: &ObjectDb) -> Result<()> {
        self.ensure_loaded(db)?;
        let (head, rest) = components.split_first().expect("non-empty path");

        if rest.is_empty() {
            self.entries.insert(
                head.to_string(),
                Child::Blob(BlobNode {
                    payload: Some(payload),
                    id: None,
                    mode: TreeEntryMode::File,
                    dirty: true,
                }),
            );
        } else {
            let needs_new_dir = !matches!(self.entries.get(*head), Some(Child::Tree(_)));
            if needs_new_dir {
                self.entries.insert(head.to_string(), Child::Tree(WorkingTree::empty()));
            }
            match self.entries.get_mut(*head) {
                Some(Child::Tree(subtree)) => subtree.set_rec(rest, payload, db)?,
                _ => unreachable!("just inserted a Tree child above"),
            }
        }
        self.dirty = true;
        Ok(())
    }

    /// Returns `true` if this node is empty after the deletion, so the
    /// caller can collapse it out of its own parent (§4.6 `delete`).
    pub fn delete(&mut self, path: &str, db: &ObjectDb) -> Result<()> {
        let components = Self::split_path(path)?;
        self.delete_rec(&components, db)?;
        Ok(())
    }

    fn delete_rec(&mut self, components: &[&str], db: &ObjectDb) -> Result<bool> {
        self.ensure_loaded(db)?;
        let (head, rest) = components.split_first().expect("non-empty path");

        if rest.is_empty() {
            self.entries.remove(*head);
        } else {
            let collapse = match self.entries.get_mut(*head) {
                Some(Child::Tree(subtree)) => subtree.delete_rec(rest, db)?,
                _ => false,
            };
            if collapse {
                self.entries.remove(*head);
            }
        }
        self.dirty = true;
        Ok(self.entries.is_empty())
    }

    /// Ensures a nested [`WorkingTree`] exists at `path`, creating
    /// intermediate directories as needed, and returns it (§4.6 `tree`).
    pub fn tree(&mut self, path: &str, db: &ObjectDb) -> Result<&mut WorkingTree> {
        let components = Self::split_path(path)?;
        self.tree_rec(&components, db)
    }

    fn tree_rec(&mut self, components: &[&str], db: &ObjectDb) -> Result<&mut WorkingTree> {
        self.ensure_loaded(db)?;
        let (head, rest) = components.split_first().expect("non-empty path");
        let needs_new_dir = !matches!(self.entries.get(*head), Some(Child::Tree(_)));
        if needs_new_dir {
            self.entries.insert(head.to_string(), Child::Tree(WorkingTree::empty()));
            self.dirty = true;
        }
        let Some(Child::Tree(subtree)) = self.entries.get_mut(*head) else {
            unreachable!("just ensured a Tree child above");
        };
        if rest.is_empty() {
            Ok(subtree)
        } else {
            subtree.tree_rec(rest, db)
        }
    }

    /// Depth-first, canonically (by-name) ordered leaves as `(path, value)`
    /// pairs (§4.6 `each`/`paths`/`values`).
    pub fn each(&mut self, db: &ObjectDb, handlers: &PayloadHandlers) -> Result<Vec<(String, Payload)>> {
        self.ensure_loaded(db)?;
        let mut out = Vec::new();
        for (name, child) in self.entries.iter_mut() {
            match child {
                Child::Blob(blob) => {
                    blob.ensure_payload(db, handlers, name)?;
                    out.push((name.clone(), blob.payload.clone().unwrap()));
                }
                Child::Tree(subtree) => {
                    for (sub_path, payload) in subtree.each(db, handlers)? {
                        out.push((format!("{name}/{sub_path}"), payload));
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn paths(&mut self, db: &ObjectDb, handlers: &PayloadHandlers) -> Result<Vec<String>> {
        Ok(self.each(db, handlers)?.into_iter().map(|(p, _)| p).collect())
    }

    pub fn values(&mut self, db: &ObjectDb, handlers: &PayloadHandlers) -> Result<Vec<Payload>> {
        Ok(self.each(db, handlers)?.into_iter().map(|(_, v)| v).collect())
    }

    /// Flattens into a `path -> value` map; a thin convenience over
    /// [`WorkingTree::each`] for callers that want random access rather than
    /// an ordered walk.
    pub fn to_mapping(
        &mut self,
        db: &ObjectDb,
        handlers: &PayloadHandlers,
    ) -> Result<BTreeMap<String, Payload>> {
        Ok(self.each(db, handlers)?.into_iter().collect())
    }

    /// Materializes every dirty node, bottom-up, into new `Blob`/`Tree`
    /// objects and returns the root tree's id (§4.6 `write`). A clean node
    /// simply returns its existing id (or writes an empty tree if it has
    /// never been persisted).
    pub fn write(&mut self, db: &ObjectDb, handlers: &PayloadHandlers) -> Result<ObjectId> {
        if !self.dirty {
            if let Some(id) = &self.id {
                return Ok(id.clone());
            }
        }
        self.ensure_loaded(db)?;

        let mut tree_entries = Vec::with_capacity(self.entries.len());
        for (name, child) in self.entries.iter_mut() {
            match child {
                Child::Blob(blob) => {
                    let id = if blob.dirty || blob.id.is_none() {
                        let payload = blob
                            .payload
                            .clone()
                            .expect("a dirty blob always has its payload in memory");
                        let bytes = handlers.encode(name, &payload)?;
                        let id = db.put(&Object::Blob(Blob::new(bytes)))?;
                        blob.id = Some(id.clone());
                        blob.dirty = false;
                        id
                    } else {
                        blob.id.clone().unwrap()
                    };
                    tree_entries.push(TreeEntry::new(blob.mode, name.clone(), id));
                }
                Child::Tree(subtree) => {
                    let id = subtree.write(db, handlers)?;
                    tree_entries.push(TreeEntry::new(TreeEntryMode::Directory, name.clone(), id));
                }
            }
        }

        let tree = Tree::from_entries(tree_entries)?;
        let id = db.put(&Object::Tree(tree))?;
        self.id = Some(id.clone());
        self.dirty = false;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectDb;
    use pretty_assertions::assert_eq;

    fn new_db() -> (assert_fs::TempDir, ObjectDb) {
        let dir = assert_fs::TempDir::new().unwrap();
        let db = ObjectDb::open(dir.path().join("objects")).unwrap();
        (dir, db)
    }

    #[test]
    fn set_then_get_round_trips() {
        let (_dir, db) = new_db();
        let handlers = PayloadHandlers::new();
        let mut tree = WorkingTree::empty();
        let payload = Payload::from_serializable(&serde_yaml::Mapping::new()).unwrap();
        tree.set("a.yml", payload.clone(), &db).unwrap();
        let got = tree.get("a.yml", &db, &handlers).unwrap();
        assert_eq!(got, Some(payload));
    }

    #[test]
    fn nested_path_creates_intermediate_directories() {
        let (_dir, db) = new_db();
        let handlers = PayloadHandlers::new();
        let mut tree = WorkingTree::empty();
        let payload = Payload::Raw(b"x".to_vec());
        tree.set("dir/sub/b.yml", payload.clone(), &db).unwrap();
        assert_eq!(tree.paths(&db, &handlers).unwrap(), vec!["dir/sub/b.yml".to_string()]);
    }

    #[test]
    fn delete_collapses_empty_parent() {
        let (_dir, db) = new_db();
        let handlers = PayloadHandlers::new();
        let mut tree = WorkingTree::empty();
        tree.set("x/y.yml", Payload::Raw(vec![1]), &db).unwrap();
        tree.delete("x/y.yml", &db).unwrap();
        assert!(tree.paths(&db, &handlers).unwrap().is_empty());
    }

    #[test]
    fn write_round_trips_through_object_db() {
        let (_dir, db) = new_db();
        let handlers = PayloadHandlers::new();
        let mut tree = WorkingTree::empty();
        tree.set("a.yml", Payload::Raw(b"hi".to_vec()), &db).unwrap();
        let root_id = tree.write(&db, &handlers).unwrap();

        let mut reloaded = WorkingTree::from_root(Some(root_id));
        let got = reloaded.get("a.yml", &db, &handlers).unwrap();
        assert_eq!(got, Some(Payload::Raw(b"hi".to_vec())));
    }

    #[test]
    fn rewriting_a_sibling_preserves_a_foreign_entrys_mode() {
        let (_dir, db) = new_db();
        let handlers = PayloadHandlers::new();

        let script_id = db
            .put(&Object::Blob(Blob::new(b"#!/bin/sh\necho hi\n".to_vec())))
            .unwrap();
        let target_id = db.put(&Object::Blob(Blob::new(b"/usr/bin/real".to_vec()))).unwrap();
        let plain_id = db.put(&Object::Blob(Blob::new(b"plain".to_vec()))).unwrap();

        let tree = Tree::from_entries(vec![
            TreeEntry::new(TreeEntryMode::Executable, "run.sh", script_id.clone()),
            TreeEntry::new(TreeEntryMode::Symlink, "link", target_id.clone()),
            TreeEntry::new(TreeEntryMode::File, "plain.txt", plain_id),
        ])
        .unwrap();
        let root_id = db.put(&Object::Tree(tree)).unwrap();

        let mut working = WorkingTree::from_root(Some(root_id));
        working
            .set("plain.txt", Payload::Raw(b"changed".to_vec()), &db)
            .unwrap();
        let new_root_id = working.write(&db, &handlers).unwrap();

        let root_object = db.get(&new_root_id).unwrap();
        let root_tree = root_object.as_tree().unwrap();
        assert_eq!(root_tree.get("run.sh").unwrap().mode, TreeEntryMode::Executable);
        assert_eq!(root_tree.get("run.sh").unwrap().id, script_id);
        assert_eq!(root_tree.get("link").unwrap().mode, TreeEntryMode::Symlink);
        assert_eq!(root_tree.get("link").unwrap().id, target_id);
        assert_eq!(root_tree.get("plain.txt").unwrap().mode, TreeEntryMode::File);
    }
}
