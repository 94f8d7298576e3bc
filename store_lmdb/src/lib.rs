//! LMDB storage backend for the Arban trust graph.
//!
//! Implements the `arban-store` traits using the `heed` LMDB bindings. Each
//! table maps to one named database, plus index databases for edge lookups by
//! endpoint, all inside a single environment. An engine operation runs inside
//! one LMDB write transaction, so a cascade either lands completely or not at all.

pub mod environment;
pub mod error;
mod keys;
mod tables;
mod txn;

pub use environment::LmdbTrustStore;
pub use error::LmdbError;
