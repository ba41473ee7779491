//! Commit: an immutable snapshot with parent linkage (§3, §4.1).
//!
//! Adapted from the teacher's `Commit` (`src/artifacts/objects/commit.rs`),
//! generalized to an ordered parent list (the teacher already supports
//! multiple parents) and using the shared [`crate::identity::Identity`]
//! line format instead of its own `Author`.

use crate::error::{Result, StoreError};
use crate::identity::Identity;
use crate::objects::object_id::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    tree: ObjectId,
    parents: Vec<ObjectId>,
    author: Identity,
    committer: Identity,
    message: String,
}

impl Commit {
    pub fn new(
        tree: ObjectId,
        parents: Vec<ObjectId>,
        author: Identity,
        committer: Identity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            author,
            committer,
            message: message.into(),
        }
    }

    pub fn tree(&self) -> &ObjectId {
        &self.tree
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    /// The commit's first parent, or `None` for a root commit. Per the
    /// open question in §9, history traversal follows this link only.
    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn author(&self) -> &Identity {
        &self.author
    }

    pub fn committer(&self) -> &Identity {
        &self.committer
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn short_message(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut lines = vec![format!("tree {}", self.tree)];
        for parent in &self.parents {
            lines.push(format!("parent {parent}"));
        }
        lines.push(format!("author {}", self.author.to_identity_line()));
        lines.push(format!("committer {}", self.committer.to_identity_line()));
        lines.push(String::new());
        lines.push(self.message.clone());
        lines.join("\n").into_bytes()
    }

    pub fn decode(content: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(content)
            .map_err(|_| StoreError::MalformedObject(None, "non-utf8 commit".into()))?;

        let err = |what: &str| StoreError::MalformedObject(None, format!("commit missing {what}"));

        // The header/body boundary is the blank line `encode` inserts; split
        // on it once so `message` is taken verbatim (including any trailing
        // newline) instead of being rejoined from `str::lines()`, which would
        // silently drop a trailing `\n`.
        let (header, message) = text
            .split_once("\n\n")
            .ok_or_else(|| err("blank line separating header from message"))?;
        let mut lines = header.lines();

        let tree_line = lines.next().ok_or_else(|| err("tree line"))?;
        let tree = ObjectId::try_parse(
            tree_line
                .strip_prefix("tree ")
                .ok_or_else(|| err("tree line"))?
                .to_string(),
        )?;

        let mut parents = Vec::new();
        let mut next = lines.next().ok_or_else(|| err("author line"))?;
        while let Some(rest) = next.strip_prefix("parent ") {
            parents.push(ObjectId::try_parse(rest.to_string())?);
            next = lines.next().ok_or_else(|| err("author line"))?;
        }

        let author = Identity::parse_identity_line(
            next.strip_prefix("author ").ok_or_else(|| err("author line"))?,
        )?;

        let committer_line = lines.next().ok_or_else(|| err("committer line"))?;
        let committer = Identity::parse_identity_line(
            committer_line
                .strip_prefix("committer ")
                .ok_or_else(|| err("committer line"))?,
        )?;

        Ok(Commit::new(tree, parents, author, committer, message.to_string()))
    }
}
