//! Author/committer identity resolution.
//!
//! Grounded on the teacher's `Author::load_from_env` (environment-variable
//! fallback for deterministic test commits), generalized into a small
//! provider trait with a config-file layer in front of it, the way a
//! production store would source identity from something more durable than
//! a shell environment.

use crate::error::Result;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::path::Path;

/// Name, email and commit timestamp, ready to format into the `author`/
/// `committer` lines of a [`crate::objects::Commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
    pub timestamp: DateTime<FixedOffset>,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    /// `"name <email> unix_ts ±HHMM"`, the canonical line format from §4.1.
    pub fn to_identity_line(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    pub fn parse_identity_line(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(crate::error::StoreError::MalformedObject(
                None,
                format!("invalid identity line {value:?}"),
            ));
        }

        let timezone = parts[0];
        let timestamp: i64 = parts[1].parse().map_err(|_| {
            crate::error::StoreError::MalformedObject(
                None,
                format!("invalid identity timestamp in {value:?}"),
            )
        })?;
        let name_email = parts[2];

        let err = || {
            crate::error::StoreError::MalformedObject(
                None,
                format!("invalid identity name/email in {value:?}"),
            )
        };
        let email_start = name_email.find('<').ok_or_else(err)?;
        let email_end = name_email.find('>').ok_or_else(err)?;

        let name = name_email[..email_start].trim().to_string();
        let email = name_email[email_start + 1..email_end].to_string();

        let naive = DateTime::from_timestamp(timestamp, 0).ok_or_else(err)?;
        let timestamp = DateTime::parse_from_str(
            &format!("{} {}", naive.format("%Y-%m-%d %H:%M:%S"), timezone),
            "%Y-%m-%d %H:%M:%S %z",
        )
        .map_err(|_| err())?;

        Ok(Identity {
            name,
            email,
            timestamp,
        })
    }
}

/// Supplies the identity used to stamp new commits and tags.
pub trait IdentityProvider {
    fn current(&self) -> Result<Identity>;
}

#[derive(Debug, Deserialize)]
struct IdentityFile {
    name: String,
    email: String,
}

/// Default provider: `identity.toml` at the repository root, then
/// `GIT_AUTHOR_{NAME,EMAIL}` (kept for parity with the teacher's test
/// harness, which injects a deterministic author this way), then a fixed
/// anonymous identity so a store is never unusable for lack of configuration.
pub struct ConfigIdentityProvider {
    repo_root: std::path::PathBuf,
}

impl ConfigIdentityProvider {
    pub fn new(repo_root: impl AsRef<Path>) -> Self {
        Self {
            repo_root: repo_root.as_ref().to_path_buf(),
        }
    }
}

impl IdentityProvider for ConfigIdentityProvider {
    fn current(&self) -> Result<Identity> {
        let config_path = self.repo_root.join("identity.toml");
        if let Ok(contents) = std::fs::read_to_string(&config_path)
            && let Ok(parsed) = toml::from_str::<IdentityFile>(&contents)
        {
            return Ok(Identity::new(parsed.name, parsed.email));
        }

        if let (Ok(name), Ok(email)) = (
            std::env::var("GIT_AUTHOR_NAME"),
            std::env::var("GIT_AUTHOR_EMAIL"),
        ) {
            return Ok(Identity::new(name, email));
        }

        Ok(Identity::new("unknown", "unknown@localhost"))
    }
}
