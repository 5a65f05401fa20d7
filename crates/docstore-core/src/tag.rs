//! Tags, named aliases that resolve to one version of a document, and the
//! append-only audit trail of tag mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// The active pointer for a `(document_id, tag)` pair. Re-tagging overwrites
/// `version`; there is never more than one row per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
  pub document_id:     String,
  pub tag:             String,
  pub version:         u32,
  pub updated_at:      DateTime<Utc>,
  pub updated_by:      String,
  pub updated_by_type: String,
  pub session_id:      String,
}

/// What happened to a tag.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TagOperation {
  /// The tag was created or moved to a version.
  Add,
  /// The tag was removed because the version it pointed at was deleted.
  Remove,
}

/// One row of tag history. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEvent {
  /// Insertion sequence; strictly increasing.
  pub event_id:    i64,
  pub document_id: String,
  pub version:     u32,
  pub tag:         String,
  pub operation:   TagOperation,
  pub actor:       String,
  pub actor_type:  String,
  pub session_id:  String,
  pub occurred_at: DateTime<Utc>,
}
