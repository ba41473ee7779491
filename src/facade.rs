//! Public path-indexed API: the façade a caller actually uses (§4.8).
//!
//! Grounded on the teacher's `Repository` (`src/areas/repository.rs`),
//! which plays the same coordinating role over `Database`/`Index`/
//! `Workspace`/`Refs`; here the staging index and working-directory
//! workspace have no counterpart (there is no external filesystem to
//! stage from), so the façade coordinates `ObjectDb` + `WorkingTree` +
//! `TransactionManager` instead.

use crate::error::{Result, StoreError};
use crate::identity::{ConfigIdentityProvider, IdentityProvider};
use crate::objects::{Commit, ObjectId};
use crate::payload::{Payload, PayloadHandler, PayloadHandlers};
use crate::refs::HeadRef;
use crate::store::ObjectDb;
use crate::transaction::TransactionManager;
use crate::working_tree::WorkingTree;
use std::path::{Path, PathBuf};

pub const DEFAULT_BRANCH: &str = "main";

/// A versioned, path-addressed key-value store backed by a content-addressed
/// object database. One `Store` owns one branch's worth of state: the
/// object db, the payload handler registry, the in-memory working tree
/// mirroring the branch tip, and the transaction manager that moves the
/// branch tip forward.
pub struct Store {
    git_dir: PathBuf,
    db: ObjectDb,
    handlers: PayloadHandlers,
    identity: Box<dyn IdentityProvider>,
    txn: TransactionManager,
    head_id: Option<ObjectId>,
    working_tree: WorkingTree,
}

impl Store {
    /// Opens an existing repository at `path`. Unless `bare`, `path/.git`
    /// must already exist (repository bootstrap is out of scope for this
    /// constructor, per §1; see [`Store::init`] for the provided
    /// convenience wrapper).
    pub fn open(path: impl AsRef<Path>, branch: &str, bare: bool) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StoreError::RepositoryMissing(path.to_path_buf()));
        }
        let git_dir = if bare { path.to_path_buf() } else { path.join(".git") };
        if !bare && !git_dir.exists() {
            return Err(StoreError::RepositoryMissing(path.to_path_buf()));
        }

        let db = ObjectDb::open(git_dir.join("objects"))?;
        let head = HeadRef::new(&git_dir, branch);
        let head_id = head.read()?;
        let working_tree = WorkingTree::from_root(head_id.clone());
        let txn = TransactionManager::new(head);
        let identity = Box::new(ConfigIdentityProvider::new(path));

        Ok(Self {
            git_dir,
            db,
            handlers: PayloadHandlers::new(),
            identity,
            txn,
            head_id,
            working_tree,
        })
    }

    /// Lays out an empty repository directory structure at `path` and
    /// opens it. The one piece of "repository bootstrap" this crate
    /// provides as a convenience (§1, §10.3) -- the core contract still
    /// assumes the layout exists.
    pub fn init(path: impl AsRef<Path>, branch: &str, bare: bool) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let git_dir = if bare { path.to_path_buf() } else { path.join(".git") };
        std::fs::create_dir_all(git_dir.join("objects").join("pack"))?;
        std::fs::create_dir_all(git_dir.join("refs").join("heads"))?;
        Self::open(path, branch, bare)
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Registers an additional extension <-> payload handler pair, open for
    /// extension per §4.5/§9. Only meaningful before any path using that
    /// extension is read or written.
    pub fn register_handler(&mut self, extension: impl Into<String>, handler: Box<dyn PayloadHandler>) {
        self.handlers.register(extension, handler);
    }

    pub fn head_id(&self) -> Option<&ObjectId> {
        self.head_id.as_ref()
    }

    /// `true` iff the on-disk head ref differs from the in-memory head's id
    /// (§4.8 `changed?`), e.g. because another process committed since this
    /// store was opened or last refreshed.
    pub fn changed(&self) -> Result<bool> {
        Ok(self.txn.head_ref().read()? != self.head_id)
    }

    /// Reloads the working tree from the on-disk head iff it has changed
    /// (§4.8 `refresh!`).
    pub fn refresh(&mut self) -> Result<()> {
        self.txn.refresh_if_changed(&mut self.working_tree, &mut self.head_id)
    }

    pub fn get(&mut self, path: &str) -> Result<Option<Payload>> {
        self.working_tree.get(path, &self.db, &self.handlers)
    }

    pub fn set(&mut self, path: &str, value: Payload) -> Result<()> {
        self.working_tree.set(path, value, &self.db)
    }

    pub fn delete(&mut self, path: &str) -> Result<()> {
        self.working_tree.delete(path, &self.db)
    }

    pub fn paths(&mut self) -> Result<Vec<String>> {
        self.working_tree.paths(&self.db, &self.handlers)
    }

    pub fn values(&mut self) -> Result<Vec<Payload>> {
        self.working_tree.values(&self.db, &self.handlers)
    }

    pub fn to_mapping(&mut self) -> Result<std::collections::BTreeMap<String, Payload>> {
        self.working_tree.to_mapping(&self.db, &self.handlers)
    }

    /// Scoped transaction: begin, run `body` against the working tree,
    /// commit on `Ok`, roll back on `Err`, guaranteed `end` (lock release +
    /// unlink) on every exit path (§4.7, §4.8).
    ///
    /// `body` is handed the store's own `PayloadHandlers` registry, not a
    /// fresh default one, so a caller who registered a custom extension via
    /// [`Store::register_handler`] gets the right decode for it inside a
    /// read-modify-write transaction too (§4.5/§9).
    pub fn transaction<F, T>(&mut self, message: &str, body: F) -> Result<T>
    where
        F: FnOnce(&mut WorkingTree, &ObjectDb, &PayloadHandlers) -> Result<T>,
    {
        let db = &self.db;
        let handlers = &self.handlers;
        self.txn.run(
            db,
            handlers,
            self.identity.as_ref(),
            &mut self.working_tree,
            &mut self.head_id,
            message,
            |wt| body(wt, db, handlers),
        )
    }

    /// Walks first-parent links starting at `start` (or the current head if
    /// `None`), yielding up to `limit` commits paired with their own ids
    /// (§4.8, §9 open question: a merge commit's other parents are never
    /// followed).
    pub fn commits(&self, limit: usize, start: Option<ObjectId>) -> Result<Vec<(ObjectId, Commit)>> {
        let mut out = Vec::with_capacity(limit.min(64));
        let mut current = start.or_else(|| self.head_id.clone());

        while out.len() < limit {
            let Some(id) = current else { break };
            let object = self.db.get(&id)?;
            let commit = object
                .as_commit()
                .ok_or_else(|| StoreError::MalformedObject(Some(id.clone()), "expected a commit object".into()))?
                .clone();
            current = commit.first_parent().cloned();
            out.push((id, commit));
        }

        Ok(out)
    }
}
