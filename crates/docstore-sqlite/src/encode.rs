//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! Metadata and tag lists are stored as compact JSON.

use std::str::FromStr as _;

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use docstore_core::{
  document::{Document, Metadata},
  tag::{Tag, TagEvent, TagOperation},
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Current time at the precision the store persists.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Metadata ────────────────────────────────────────────────────────────────

pub fn encode_metadata(m: &Metadata) -> Result<String> { Ok(serde_json::to_string(m)?) }

pub fn decode_metadata(s: &str) -> Result<Metadata> { Ok(serde_json::from_str(s)?) }

// ─── Tags ────────────────────────────────────────────────────────────────────

/// Decode the `json_group_array` of tag names attached to a header row.
pub fn decode_tag_names(s: Option<&str>) -> Result<Vec<String>> {
  let mut tags: Vec<String> = match s {
    Some(json) => serde_json::from_str(json)?,
    None => Vec::new(),
  };
  tags.sort();
  Ok(tags)
}

pub fn decode_operation(s: &str) -> Result<TagOperation> {
  TagOperation::from_str(s).map_err(|_| Error::Decode(format!("unknown tag operation: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns selected for a document row, in order. `{body}` is replaced by
/// either `b.body` or `NULL` depending on whether the body was requested.
pub const DOCUMENT_COLUMNS: &str = "
  h.document_id, h.version, h.doc_type, h.name, h.namespace, h.metadata,
  h.created_at, h.created_by, h.created_by_type, h.session_id,
  (SELECT json_group_array(t.tag) FROM document_tags t
    WHERE t.document_id = h.document_id AND t.version = h.version) AS tags,
  {body} AS body";

/// `SELECT ... FROM document_headers h` with or without the body join.
pub fn select_documents(include_body: bool) -> String {
  if include_body {
    format!(
      "SELECT {} FROM document_headers h
       JOIN document_bodies b ON b.body_ref = h.body_ref",
      DOCUMENT_COLUMNS.replace("{body}", "b.body")
    )
  } else {
    format!("SELECT {} FROM document_headers h", DOCUMENT_COLUMNS.replace("{body}", "NULL"))
  }
}

/// Raw values read directly from a header row (plus its tags and body).
pub struct RawDocument {
  pub document_id:     String,
  pub version:         u32,
  pub doc_type:        String,
  pub name:            String,
  pub namespace:       String,
  pub metadata:        String,
  pub created_at:      String,
  pub created_by:      String,
  pub created_by_type: String,
  pub session_id:      String,
  pub tags:            Option<String>,
  pub body:            Option<String>,
}

impl RawDocument {
  /// Row mapper matching [`DOCUMENT_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      document_id:     row.get(0)?,
      version:         row.get(1)?,
      doc_type:        row.get(2)?,
      name:            row.get(3)?,
      namespace:       row.get(4)?,
      metadata:        row.get(5)?,
      created_at:      row.get(6)?,
      created_by:      row.get(7)?,
      created_by_type: row.get(8)?,
      session_id:      row.get(9)?,
      tags:            row.get(10)?,
      body:            row.get(11)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      document_id:     self.document_id,
      doc_type:        self.doc_type,
      name:            self.name,
      namespace:       self.namespace,
      version:         self.version,
      metadata:        decode_metadata(&self.metadata)?,
      body:            self.body,
      created_at:      decode_dt(&self.created_at)?,
      created_by:      self.created_by,
      created_by_type: self.created_by_type,
      session_id:      self.session_id,
      tags:            decode_tag_names(self.tags.as_deref())?,
    })
  }
}

pub struct RawTag {
  pub document_id:     String,
  pub tag:             String,
  pub version:         u32,
  pub updated_at:      String,
  pub updated_by:      String,
  pub updated_by_type: String,
  pub session_id:      String,
}

impl RawTag {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      document_id:     row.get(0)?,
      tag:             row.get(1)?,
      version:         row.get(2)?,
      updated_at:      row.get(3)?,
      updated_by:      row.get(4)?,
      updated_by_type: row.get(5)?,
      session_id:      row.get(6)?,
    })
  }

  pub fn into_tag(self) -> Result<Tag> {
    Ok(Tag {
      document_id:     self.document_id,
      tag:             self.tag,
      version:         self.version,
      updated_at:      decode_dt(&self.updated_at)?,
      updated_by:      self.updated_by,
      updated_by_type: self.updated_by_type,
      session_id:      self.session_id,
    })
  }
}

pub struct RawTagEvent {
  pub event_id:    i64,
  pub document_id: String,
  pub version:     u32,
  pub tag:         String,
  pub operation:   String,
  pub actor:       String,
  pub actor_type:  String,
  pub session_id:  String,
  pub occurred_at: String,
}

impl RawTagEvent {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:    row.get(0)?,
      document_id: row.get(1)?,
      version:     row.get(2)?,
      tag:         row.get(3)?,
      operation:   row.get(4)?,
      actor:       row.get(5)?,
      actor_type:  row.get(6)?,
      session_id:  row.get(7)?,
      occurred_at: row.get(8)?,
    })
  }

  pub fn into_event(self) -> Result<TagEvent> {
    Ok(TagEvent {
      event_id:    self.event_id,
      document_id: self.document_id,
      version:     self.version,
      tag:         self.tag,
      operation:   decode_operation(&self.operation)?,
      actor:       self.actor,
      actor_type:  self.actor_type,
      session_id:  self.session_id,
      occurred_at: decode_dt(&self.occurred_at)?,
    })
  }
}
