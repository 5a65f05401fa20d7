//! SQLite backend for the document store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One [`SqliteStore`] implements both
//! [`DocumentRepository`](docstore_core::store::DocumentRepository) and
//! [`TagManager`](docstore_core::store::TagManager).

mod encode;
mod schema;
mod store;
mod tags;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreOptions};

#[cfg(test)]
mod tests;
