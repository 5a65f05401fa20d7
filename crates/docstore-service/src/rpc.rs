//! Request and response shapes of the RPC surface.
//!
//! Every response carries `success` and `message`. Expected failures
//! (validation, not found, storage faults) are reported through those fields;
//! callers branch on `success`, not on transport errors.

use chrono::{DateTime, Utc};
use docstore_core::{
  context::ScoredDocument,
  document::{Document, NewDocument},
  tag::{Tag, TagEvent},
};
use serde::{Deserialize, Serialize};

/// Build the `success = false` form of a response.
pub trait Failure: Default {
  fn failure(message: impl Into<String>) -> Self;
}

macro_rules! flagged_response {
  ($($ty:ty),+ $(,)?) => {
    $(
      impl Failure for $ty {
        fn failure(message: impl Into<String>) -> Self {
          Self { success: false, message: message.into(), ..Self::default() }
        }
      }
    )+
  };
}

flagged_response!(
  PutDocumentResponse,
  PutDocumentsResponse,
  GetDocumentResponse,
  ListDocumentsResponse,
  GetSessionContextResponse,
  TagDocumentResponse,
  ListActiveTagsResponse,
  ListTagEventsResponse,
  ListDocumentVersionsResponse,
  DeleteDocumentResponse,
);

// ─── PutDocument ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PutDocumentRequest {
  pub document: NewDocument,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutDocumentResponse {
  pub success:     bool,
  pub message:     String,
  pub document_id: String,
  /// `0` when nothing was saved.
  pub version:     u32,
}

// ─── PutDocuments ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PutDocumentsRequest {
  pub documents: Vec<NewDocument>,
}

/// Outcome for one input document, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
  pub success:       bool,
  pub document_id:   String,
  pub version:       u32,
  pub error_message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutDocumentsResponse {
  /// `true` only when every receipt succeeded.
  pub success:  bool,
  pub message:  String,
  pub receipts: Vec<Receipt>,
}

// ─── GetDocument ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetDocumentRequest {
  pub document_id:       String,
  /// At most one of `version` and `tag`; neither means latest.
  pub version:           Option<u32>,
  pub tag:               Option<String>,
  pub include_body:      bool,
  pub requested_by:      String,
  pub requested_by_type: String,
  pub session_id:        String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetDocumentResponse {
  pub success:  bool,
  pub message:  String,
  pub document: Option<Document>,
}

// ─── ListDocuments ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListDocumentsRequest {
  pub namespace:    Option<String>,
  #[serde(rename = "type")]
  pub doc_type:     Option<String>,
  pub tag:          Option<String>,
  pub session_id:   Option<String>,
  pub page_token:   Option<String>,
  pub page_size:    Option<usize>,
  pub include_body: bool,
  pub latest_only:  bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListDocumentsResponse {
  pub success:         bool,
  pub message:         String,
  pub documents:       Vec<Document>,
  pub total_count:     u64,
  pub next_page_token: Option<String>,
}

// ─── GetSessionContext ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetSessionContextRequest {
  pub session_id:        String,
  pub document_types:    Vec<String>,
  pub since:             Option<DateTime<Utc>>,
  pub limit:             Option<usize>,
  pub include_body:      bool,
  pub requested_by:      String,
  pub requested_by_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetSessionContextResponse {
  pub success:     bool,
  pub message:     String,
  /// Ranked, most relevant first.
  pub documents:   Vec<ScoredDocument>,
  pub total_count: u64,
}

// ─── TagDocument ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagDocumentRequest {
  pub document_id:    String,
  pub version:        u32,
  pub tag:            String,
  pub tagged_by:      String,
  pub tagged_by_type: String,
  pub session_id:     String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagDocumentResponse {
  pub success: bool,
  pub message: String,
}

// ─── ListActiveTags ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListActiveTagsRequest {
  pub document_id: String,
  pub version:     Option<u32>,
  pub page_token:  Option<String>,
  pub page_size:   Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListActiveTagsResponse {
  pub success:         bool,
  pub message:         String,
  pub tags:            Vec<Tag>,
  pub total_count:     u64,
  pub next_page_token: Option<String>,
}

// ─── ListTagEvents ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListTagEventsRequest {
  pub document_id: String,
  pub tag:         Option<String>,
  pub page_token:  Option<String>,
  pub page_size:   Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTagEventsResponse {
  pub success:         bool,
  pub message:         String,
  pub events:          Vec<TagEvent>,
  pub total_count:     u64,
  pub next_page_token: Option<String>,
}

// ─── ListDocumentVersions ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListDocumentVersionsRequest {
  pub document_id:  String,
  pub page_token:   Option<String>,
  pub page_size:    Option<usize>,
  pub include_body: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListDocumentVersionsResponse {
  pub success:         bool,
  pub message:         String,
  pub documents:       Vec<Document>,
  pub total_count:     u64,
  pub next_page_token: Option<String>,
}

// ─── DeleteDocument ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteDocumentRequest {
  pub document_id:     String,
  /// `None` deletes every version.
  pub version:         Option<u32>,
  pub deleted_by:      String,
  pub deleted_by_type: String,
  pub session_id:      String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteDocumentResponse {
  pub success:          bool,
  pub message:          String,
  pub versions_deleted: u64,
}

// ─── HealthCheck ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
  pub healthy:   bool,
  /// `"SERVING"` or `"NOT_SERVING"`.
  pub status:    String,
  pub timestamp: DateTime<Utc>,
}
