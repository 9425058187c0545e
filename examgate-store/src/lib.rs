//! Key-value document store seam for examgate.
//!
//! The engine keeps exactly two kinds of shared state, each one document
//! per account:
//! - `licenses/{accountId}`: written by the admin tooling, read-only here
//! - `sessions/{accountId}`: the single-device session lease
//!
//! # Consistency model
//!
//! Stores are treated as eventually-consistent, last-write-wins maps with
//! no transactions and no compare-and-swap. Anything built on top must
//! tolerate a read-decide-write race. The narrow `DocumentStore` trait is
//! the only place a transactional backend would need to plug in.
//!
//! # Backends
//!
//! - [`MemoryStore`]: shared in-process map with failure injection, used by
//!   tests and simulations
//! - [`JsonDirStore`]: one JSON file per document on local disk

mod document;
mod error;
mod json_dir;
mod memory;

pub use document::{Collection, DocumentStore, read_document, write_document};
pub use error::{StoreError, StoreResult};
pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;
