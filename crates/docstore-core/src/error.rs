//! Error types for `docstore-core`.
//!
//! This is the taxonomy every layer above storage classifies failures into.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("document not found: {0}")]
  DocumentNotFound(String),

  #[error("document {document_id} has no version {version}")]
  VersionNotFound { document_id: String, version: u32 },

  #[error("document {document_id} has no tag {tag:?}")]
  TagNotFound { document_id: String, tag: String },

  #[error("invalid page token")]
  InvalidPageToken,

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// `true` for the not-found family, which the protocol reports as a flagged
  /// failure rather than a storage fault.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::DocumentNotFound(_) | Self::VersionNotFound { .. } | Self::TagNotFound { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
