//! Context-scoped credential storage.
//!
//! - `storage`: the storage medium (`TokenStorage` trait and an in-memory implementation)
//! - `store`: per-context credential stores built on top of a storage medium

pub mod storage;
pub mod store;

pub use storage::{MemoryStorage, TokenStorage};
pub use store::{CredentialStore, CredentialStores, STAFF_SESSION_MARKER};
