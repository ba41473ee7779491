//! On-disk object storage: loose objects, packfiles, and the unified
//! [`object_db::ObjectDb`] that sits in front of both (§4.2-§4.4).

pub mod loose;
pub mod object_db;
pub mod pack;

pub use loose::LooseStore;
pub use object_db::ObjectDb;
pub use pack::PackStore;
