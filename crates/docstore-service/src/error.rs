//! Error types for event delivery.
//!
//! Neither type ever reaches a caller of the service: emission failures are
//! logged and dropped.

use thiserror::Error;

/// A single publish attempt failed.
#[derive(Debug, Error)]
pub enum BusError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("event bus rejected event with status {0}")]
  Rejected(u16),

  #[error("event bus misconfigured: {0}")]
  Config(String),
}

/// Every publish attempt for one event failed.
#[derive(Debug, Error)]
#[error("event {event_type} dropped after {attempts} attempt(s): {last}")]
pub struct EmitError {
  pub event_type: String,
  pub attempts:   u32,
  #[source]
  pub last:       BusError,
}
