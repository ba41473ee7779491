//! A versioned, path-addressed key-value store whose on-disk format is
//! byte-compatible with a standard distributed version-control object
//! database. See `Store` for the public entry point.

pub mod error;
pub mod facade;
pub mod identity;
pub mod objects;
pub mod payload;
pub mod refs;
pub mod store;
pub mod transaction;
pub mod working_tree;

pub use error::{Result, StoreError};
pub use facade::{Store, DEFAULT_BRANCH};
pub use identity::{ConfigIdentityProvider, Identity, IdentityProvider};
pub use payload::{Payload, PayloadHandler, PayloadHandlers};
