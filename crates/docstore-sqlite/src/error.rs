//! Error type for `docstore-sqlite`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] docstore_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("corrupt row: {0}")]
  Decode(String),

  /// Tag target does not exist.
  #[error("document {document_id} has no version {version}")]
  VersionNotFound { document_id: String, version: u32 },

  #[error("storage call exceeded {0:?}")]
  Timeout(Duration),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for docstore_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(inner) => inner,
      Error::Json(inner) => Self::Serialization(inner),
      Error::VersionNotFound { document_id, version } => {
        Self::VersionNotFound { document_id, version }
      }
      other => Self::Storage(Box::new(other)),
    }
  }
}
