//! The `DocumentRepository` and `TagManager` traits and their query types.
//!
//! Traits are implemented by storage backends (e.g. `docstore-sqlite`).
//! The service layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  document::{Actor, Document, NewDocument},
  page::{Page, PageRequest},
  tag::{Tag, TagEvent},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`DocumentRepository::list`]. Every filter is optional;
/// results are ordered by creation time, newest first.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
  pub namespace:    Option<String>,
  pub doc_type:     Option<String>,
  /// Only versions this tag currently points at.
  pub tag:          Option<String>,
  pub session_id:   Option<String>,
  /// Collapse to the highest version of each `document_id`.
  pub latest_only:  bool,
  pub include_body: bool,
  pub page:         PageRequest,
}

/// Candidate selection for the session context ranker.
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
  pub session_id:   String,
  /// Empty means every type.
  pub doc_types:    Vec<String>,
  /// Lower bound (inclusive) on `created_at`.
  pub since:        Option<DateTime<Utc>>,
  pub include_body: bool,
}

/// Input for [`TagManager::tag`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRequest {
  pub document_id: String,
  pub version:     u32,
  pub tag:         String,
  pub actor:       Actor,
  pub session_id:  String,
}

// ─── Repository ──────────────────────────────────────────────────────────────

/// Persistence of document headers and bodies, and version assignment.
///
/// Reads take no locks and may observe any committed state. Methods that look
/// a single document up return `Ok(None)` when it does not exist.
pub trait DocumentRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  /// Persist `input` as the next version of its document.
  ///
  /// The version is `max(existing) + 1`, or 1 for a new document. Header and
  /// body are written in one atomic unit: on failure nothing is visible.
  /// `input.tags` is ignored here; tags are applied through [`TagManager`].
  fn save(
    &self,
    input: NewDocument,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  fn get_by_version<'a>(
    &'a self,
    document_id: &'a str,
    version: u32,
    include_body: bool,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;

  /// Resolve `tag` to a version and fetch that version.
  fn get_by_tag<'a>(
    &'a self,
    document_id: &'a str,
    tag: &'a str,
    include_body: bool,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;

  fn get_latest<'a>(
    &'a self,
    document_id: &'a str,
    include_body: bool,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;

  /// Keyset-paginated listing ordered by `created_at` descending.
  fn list<'a>(
    &'a self,
    query: &'a DocumentQuery,
  ) -> impl Future<Output = Result<Page<Document>, Self::Error>> + Send + 'a;

  /// Every stored version of one document, highest version first.
  fn list_versions<'a>(
    &'a self,
    document_id: &'a str,
    include_body: bool,
    page: &'a PageRequest,
  ) -> impl Future<Output = Result<Page<Document>, Self::Error>> + Send + 'a;

  /// All documents of a session matching `query`, unordered.
  fn session_documents<'a>(
    &'a self,
    query: &'a SessionQuery,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + 'a;

  /// Hard-delete one version. Tags pointing at it are removed and a `remove`
  /// tag event is recorded for each, attributed to `actor`.
  /// Returns the number of versions deleted (0 or 1).
  fn delete_version<'a>(
    &'a self,
    document_id: &'a str,
    version: u32,
    actor: &'a Actor,
    session_id: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Hard-delete every version, with the same tag cascade as
  /// [`delete_version`](Self::delete_version).
  fn delete_all<'a>(
    &'a self,
    document_id: &'a str,
    actor: &'a Actor,
    session_id: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Trivial connectivity probe.
  fn health_check(&self) -> impl Future<Output = bool> + Send + '_;
}

// ─── Tags ────────────────────────────────────────────────────────────────────

/// The alias table and its append-only audit log.
pub trait TagManager: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  /// Point `request.tag` at `request.version`, creating or overwriting the
  /// active row, and append an `add` tag event.
  ///
  /// Fails with a version-not-found error if the target version does not
  /// exist.
  fn tag<'a>(
    &'a self,
    request: &'a TagRequest,
  ) -> impl Future<Output = Result<Tag, Self::Error>> + Send + 'a;

  /// Active tags of a document ordered by tag name, optionally restricted to
  /// those pointing at `version`.
  fn list_active_tags<'a>(
    &'a self,
    document_id: &'a str,
    version: Option<u32>,
    page: &'a PageRequest,
  ) -> impl Future<Output = Result<Page<Tag>, Self::Error>> + Send + 'a;

  /// Tag history of a document in insertion order, oldest first.
  fn list_tag_events<'a>(
    &'a self,
    document_id: &'a str,
    tag: Option<&'a str>,
    page: &'a PageRequest,
  ) -> impl Future<Output = Result<Page<TagEvent>, Self::Error>> + Send + 'a;
}
