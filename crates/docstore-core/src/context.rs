//! Session context ranking.
//!
//! Orders a session's documents for downstream consumption (e.g. prompt
//! assembly). The score is a fixed heuristic lookup on the document `type`;
//! it is not learned and not configurable at runtime. Ties are always broken
//! by recency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  document::Document,
  store::{DocumentRepository, SessionQuery},
};

pub const DEFAULT_CONTEXT_LIMIT: usize = 20;
pub const MAX_CONTEXT_LIMIT: usize = 500;

/// Relevance weight per document type. Anything not listed scores
/// [`OTHER_RELEVANCE`].
pub const RELEVANCE_TABLE: &[(&str, f64)] = &[
  ("interaction_log", 1.0),
  ("feedback", 0.8),
  ("configuration", 0.6),
  ("knowledge_base", 0.4),
];

pub const OTHER_RELEVANCE: f64 = 0.2;

pub fn relevance_score(doc_type: &str) -> f64 {
  RELEVANCE_TABLE
    .iter()
    .find(|(t, _)| *t == doc_type)
    .map_or(OTHER_RELEVANCE, |(_, w)| *w)
}

/// A document with its computed relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
  pub relevance_score: f64,
  pub document:        Document,
}

/// Parameters for [`get_session_context`].
#[derive(Debug, Clone, Default)]
pub struct ContextRequest {
  pub session_id:   String,
  pub doc_types:    Vec<String>,
  pub since:        Option<DateTime<Utc>>,
  /// `0` selects [`DEFAULT_CONTEXT_LIMIT`].
  pub limit:        usize,
  pub include_body: bool,
}

impl ContextRequest {
  pub fn effective_limit(&self) -> usize {
    match self.limit {
      0 => DEFAULT_CONTEXT_LIMIT,
      n => n.min(MAX_CONTEXT_LIMIT),
    }
  }
}

/// Score `docs`, order by `(relevance_score DESC, created_at DESC)`, and keep
/// at most `limit`.
pub fn rank(docs: Vec<Document>, limit: usize) -> Vec<ScoredDocument> {
  let mut scored: Vec<ScoredDocument> = docs
    .into_iter()
    .map(|document| ScoredDocument {
      relevance_score: relevance_score(&document.doc_type),
      document,
    })
    .collect();

  scored.sort_by(|a, b| {
    b.relevance_score
      .total_cmp(&a.relevance_score)
      .then_with(|| b.document.created_at.cmp(&a.document.created_at))
      // Stable output for identical timestamps.
      .then_with(|| a.document.document_id.cmp(&b.document.document_id))
      .then_with(|| b.document.version.cmp(&a.document.version))
  });
  scored.truncate(limit);
  scored
}

/// Fetch the session's candidates from `repo` and rank them.
///
/// Candidates are ranked on headers alone. Bodies, when requested, are loaded
/// only for the documents that survive truncation. A version deleted between
/// the two reads is dropped from the result.
pub async fn get_session_context<R: DocumentRepository>(
  repo: &R,
  request: &ContextRequest,
) -> Result<Vec<ScoredDocument>, R::Error> {
  let query = SessionQuery {
    session_id:   request.session_id.clone(),
    doc_types:    request.doc_types.clone(),
    since:        request.since,
    include_body: false,
  };
  let candidates = repo.session_documents(&query).await?;
  let ranked = rank(candidates, request.effective_limit());
  if !request.include_body {
    return Ok(ranked);
  }

  let mut with_bodies = Vec::with_capacity(ranked.len());
  for scored in ranked {
    let header = &scored.document;
    let full = repo.get_by_version(&header.document_id, header.version, true).await?;
    if let Some(document) = full {
      with_bodies.push(ScoredDocument { document, ..scored });
    }
  }
  Ok(with_bodies)
}
