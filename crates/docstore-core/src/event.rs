//! Change events: the envelope published after every mutating operation.
//!
//! Events are built and published within the request that caused them and
//! are never persisted by the store itself. Delivery is at-least-once at best.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::Actor;

// ─── Payload ─────────────────────────────────────────────────────────────────

/// Typed event body. The variant selects the envelope's `event_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
  DocumentCreated {
    document_id: String,
    version:     u32,
    doc_type:    String,
    namespace:   String,
    name:        String,
  },
  DocumentAccessed {
    document_id: String,
    version:     u32,
    /// The tag the caller resolved through, if any.
    via_tag:     Option<String>,
  },
  DocumentTagged {
    document_id: String,
    version:     u32,
    tag:         String,
  },
  DocumentDeleted {
    document_id:      String,
    /// `None` when every version was deleted.
    version:          Option<u32>,
    versions_deleted: u64,
  },
  SessionContextAccessed {
    session_id:     String,
    document_types: Vec<String>,
    document_count: usize,
  },
}

impl EventPayload {
  /// Dotted event name consumers route on.
  pub fn event_type(&self) -> &'static str {
    match self {
      Self::DocumentCreated { .. } => "document.created",
      Self::DocumentAccessed { .. } => "document.accessed",
      Self::DocumentTagged { .. } => "document.tagged",
      Self::DocumentDeleted { .. } => "document.deleted",
      Self::SessionContextAccessed { .. } => "session.context_accessed",
    }
  }
}

// ─── Envelope ────────────────────────────────────────────────────────────────

/// The normalised envelope handed to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
  /// Fresh per emission; redeliveries of one emission share it.
  pub event_id:        Uuid,
  pub event_type:      String,
  pub occurred_at:     DateTime<Utc>,
  /// Monotonic within the emitting process only.
  pub sequence_number: u64,
  pub source_service:  String,
  pub trace_id:        Uuid,
  pub correlation_id:  Uuid,
  pub actor:           Actor,
  pub session_id:      String,
  /// Single-tenant placeholder; carried, never enforced.
  pub tenant_id:       String,
  pub payload:         EventPayload,
}

#[cfg(test)]
mod tests {
  use super::EventPayload;

  #[test]
  fn payload_selects_event_type() {
    let created = EventPayload::DocumentCreated {
      document_id: "A".into(),
      version:     1,
      doc_type:    "knowledge_base".into(),
      namespace:   "ns".into(),
      name:        String::new(),
    };
    assert_eq!(created.event_type(), "document.created");

    let ctx = EventPayload::SessionContextAccessed {
      session_id:     "s".into(),
      document_types: vec![],
      document_count: 0,
    };
    assert_eq!(ctx.event_type(), "session.context_accessed");
  }

  #[test]
  fn payload_serialises_with_kind_tag() {
    let tagged = EventPayload::DocumentTagged {
      document_id: "A".into(),
      version:     2,
      tag:         "prod".into(),
    };
    let json = serde_json::to_value(&tagged).unwrap();
    assert_eq!(json["kind"], "document_tagged");
    assert_eq!(json["version"], 2);
  }
}
