//! Core types and trait definitions for the versioned document store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::DocumentRepository`] and
//! [`store::TagManager`]; the service layer depends only on those traits.

pub mod context;
pub mod document;
pub mod error;
pub mod event;
pub mod page;
pub mod store;
pub mod tag;

pub use error::{Error, Result};
