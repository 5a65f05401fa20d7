//! Document types: one logical entity, many immutable versions.
//!
//! A document is identified by a caller-chosen `document_id` that is stable
//! across versions. Each save produces a new version; versions are never
//! updated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque key/value metadata carried alongside a document version.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ─── Actor ───────────────────────────────────────────────────────────────────

/// Who performed an operation: an identifier plus a free-form kind
/// (`"user"`, `"agent"`, `"system"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub id:   String,
  pub kind: String,
}

impl Actor {
  pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
    Self { id: id.into(), kind: kind.into() }
  }
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// Input for [`DocumentRepository::save`](crate::store::DocumentRepository::save).
/// `version` and `created_at` are assigned by the store.
///
/// Every field defaults when absent so that a missing required field reaches
/// validation and is reported per document instead of rejecting the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewDocument {
  pub document_id:     String,
  #[serde(rename = "type")]
  pub doc_type:        String,
  pub name:            String,
  pub namespace:       String,
  pub metadata:        Metadata,
  /// Opaque serialised payload, stored apart from the header.
  pub body:            String,
  pub created_by:      String,
  pub created_by_type: String,
  pub session_id:      String,
  /// Tags to point at the new version once it is saved.
  pub tags:            Vec<String>,
}

// ─── Stored ──────────────────────────────────────────────────────────────────

/// A persisted document version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  pub document_id:     String,
  #[serde(rename = "type")]
  pub doc_type:        String,
  pub name:            String,
  pub namespace:       String,
  /// Strictly increasing per `document_id`, starting at 1.
  pub version:         u32,
  pub metadata:        Metadata,
  /// `None` when the caller asked for headers only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body:            Option<String>,
  pub created_at:      DateTime<Utc>,
  pub created_by:      String,
  pub created_by_type: String,
  pub session_id:      String,
  /// Active tags currently pointing at this version.
  #[serde(default)]
  pub tags:            Vec<String>,
}

impl Document {
  /// Drop the body, keeping only the header.
  pub fn without_body(mut self) -> Self {
    self.body = None;
    self
  }

  pub fn created_by(&self) -> Actor {
    Actor::new(self.created_by.clone(), self.created_by_type.clone())
  }
}
