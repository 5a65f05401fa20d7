//! [`SqliteStore`]: the SQLite implementation of [`DocumentRepository`].

use std::{
  path::Path,
  time::{Duration, Instant},
};

use docstore_core::{
  document::{Actor, Document, NewDocument},
  page::{Page, PageRequest, encode_cursor},
  store::{DocumentQuery, DocumentRepository, SessionQuery},
  tag::TagOperation,
};
use rusqlite::{
  OptionalExtension as _, TransactionBehavior, params, params_from_iter, types::Value,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawDocument, encode_dt, encode_metadata, now, select_documents},
  schema::SCHEMA,
};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// Upper bound on a single storage call, also used as SQLite's busy
  /// timeout. Reads are abandoned when it expires; writes roll back instead
  /// of committing late.
  pub timeout: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self { Self { timeout: Duration::from_secs(5) } }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  options: StoreOptions,
}

/// Point past which a write transaction must not commit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
  /// `None` when the budget is too large to represent.
  at: Option<Instant>,
}

impl Deadline {
  fn after(budget: Duration) -> Self { Self { at: Instant::now().checked_add(budget) } }

  /// Call immediately before `commit`. The error aborts the closure and the
  /// dropped transaction rolls back.
  pub(crate) fn check(self) -> tokio_rusqlite::Result<()> {
    if self.at.is_some_and(|at| Instant::now() >= at) {
      return Err(tokio_rusqlite::Error::Other(Box::new(DeadlineExceeded)));
    }
    Ok(())
  }
}

#[derive(Debug, thiserror::Error)]
#[error("write deadline passed before commit")]
struct DeadlineExceeded;

/// Keyset for [`DocumentRepository::list`]: the last row's sort key.
#[derive(Debug, Serialize, Deserialize)]
struct ListCursor {
  created_at:  String,
  document_id: String,
  version:     u32,
}

/// Keyset for [`DocumentRepository::list_versions`].
#[derive(Debug, Serialize, Deserialize)]
struct VersionCursor {
  version: u32,
}

/// Pre-encoded header and body for one save.
struct HeaderRow {
  document_id:     String,
  doc_type:        String,
  name:            String,
  namespace:       String,
  metadata:        String,
  body:            String,
  created_at:      String,
  created_by:      String,
  created_by_type: String,
  session_id:      String,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, options };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the per-call budget. SQLite's busy timeout keeps the value the
  /// store was opened with.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.options.timeout = timeout;
    self
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, options: StoreOptions::default() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let busy = self.options.timeout;
    self
      .call(move |conn| {
        conn.busy_timeout(busy)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run a read-only `f` on the connection thread, bounded by the configured
  /// timeout. Never use this for writes: an expired call keeps running on the
  /// connection thread and may still commit.
  pub(crate) async fn call<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let timeout = self.options.timeout;
    match tokio::time::timeout(timeout, self.conn.call(f)).await {
      Ok(result) => Ok(result?),
      Err(_) => Err(Error::Timeout(timeout)),
    }
  }

  /// Run a mutating `f` on the connection thread. `f` must check the
  /// [`Deadline`] right before committing; an expired deadline surfaces as
  /// [`Error::Timeout`] with nothing written.
  pub(crate) async fn write<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection, Deadline) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let budget = self.options.timeout;
    let deadline = Deadline::after(budget);
    match self.conn.call(move |conn| f(conn, deadline)).await {
      Err(tokio_rusqlite::Error::Other(e)) if e.is::<DeadlineExceeded>() => {
        Err(Error::Timeout(budget))
      }
      other => Ok(other?),
    }
  }

  async fn fetch_one(&self, sql: String, args: Vec<Value>) -> Result<Option<Document>> {
    let raw: Option<RawDocument> = self
      .call(move |conn| {
        Ok(conn.query_row(&sql, params_from_iter(args.iter()), RawDocument::from_row).optional()?)
      })
      .await?;
    raw.map(RawDocument::into_document).transpose()
  }

  async fn delete_versions(
    &self,
    document_id: &str,
    version: Option<u32>,
    actor: &Actor,
    session_id: &str,
  ) -> Result<u64> {
    let document_id = document_id.to_owned();
    let actor = actor.clone();
    let session_id = session_id.to_owned();
    let at_str = encode_dt(now());

    let (deleted, untagged) = self
      .write(move |conn, deadline| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Tags would dangle once their version is gone; drop them and record
        // why in the history.
        let removed: Vec<(String, u32)> = {
          let mut stmt = tx.prepare(
            "SELECT tag, version FROM document_tags
             WHERE document_id = ?1 AND (?2 IS NULL OR version = ?2)",
          )?;
          stmt
            .query_map(params![document_id, version], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?
        };
        tx.execute(
          "DELETE FROM document_tags WHERE document_id = ?1 AND (?2 IS NULL OR version = ?2)",
          params![document_id, version],
        )?;
        for (tag, tagged_version) in &removed {
          tx.execute(
            "INSERT INTO tag_events
               (document_id, version, tag, operation, actor, actor_type, session_id, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
              document_id,
              tagged_version,
              tag,
              TagOperation::Remove.as_ref(),
              actor.id,
              actor.kind,
              session_id,
              at_str,
            ],
          )?;
        }

        let body_refs: Vec<String> = {
          let mut stmt = tx.prepare(
            "SELECT body_ref FROM document_headers
             WHERE document_id = ?1 AND (?2 IS NULL OR version = ?2)",
          )?;
          stmt
            .query_map(params![document_id, version], |r| r.get(0))?
            .collect::<rusqlite::Result<_>>()?
        };
        let deleted = tx.execute(
          "DELETE FROM document_headers WHERE document_id = ?1 AND (?2 IS NULL OR version = ?2)",
          params![document_id, version],
        )?;
        for body_ref in &body_refs {
          tx.execute("DELETE FROM document_bodies WHERE body_ref = ?1", params![body_ref])?;
        }

        deadline.check()?;
        tx.commit()?;
        Ok((deleted as u64, removed.len()))
      })
      .await?;

    if untagged > 0 {
      tracing::debug!(untagged, deleted, "removed tags of deleted versions");
    }
    Ok(deleted)
  }
}

/// Assign the next version and write body + header as one transaction.
///
/// `IMMEDIATE` takes the write lock before reading `MAX(version)`, so two
/// writers, on this connection or any other open on the same file, cannot
/// read the same maximum. A writer that cannot get the lock within the busy
/// timeout fails with `SQLITE_BUSY`.
fn insert_next_version(
  conn: &mut rusqlite::Connection,
  row: &HeaderRow,
  deadline: Deadline,
) -> tokio_rusqlite::Result<u32> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let version: u32 = tx.query_row(
    "SELECT COALESCE(MAX(version), 0) + 1 FROM document_headers WHERE document_id = ?1",
    params![row.document_id],
    |r| r.get(0),
  )?;

  let body_ref = Uuid::new_v4().hyphenated().to_string();
  tx.execute(
    "INSERT INTO document_bodies (body_ref, body) VALUES (?1, ?2)",
    params![body_ref, row.body],
  )?;
  tx.execute(
    "INSERT INTO document_headers (
       document_id, version, doc_type, name, namespace, metadata, body_ref,
       created_at, created_by, created_by_type, session_id
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    params![
      row.document_id,
      version,
      row.doc_type,
      row.name,
      row.namespace,
      row.metadata,
      body_ref,
      row.created_at,
      row.created_by,
      row.created_by_type,
      row.session_id,
    ],
  )?;

  deadline.check()?;
  tx.commit()?;
  Ok(version)
}

/// Split a `limit + 1` fetch into the page and whether more rows follow.
fn take_page(mut rows: Vec<Document>, size: usize) -> (Vec<Document>, bool) {
  let more = rows.len() > size;
  rows.truncate(size);
  (rows, more)
}

// ─── DocumentRepository impl ─────────────────────────────────────────────────

impl DocumentRepository for SqliteStore {
  type Error = Error;

  async fn save(&self, input: NewDocument) -> Result<Document> {
    let created_at = now();
    let row = HeaderRow {
      document_id:     input.document_id.clone(),
      doc_type:        input.doc_type.clone(),
      name:            input.name.clone(),
      namespace:       input.namespace.clone(),
      metadata:        encode_metadata(&input.metadata)?,
      body:            input.body.clone(),
      created_at:      encode_dt(created_at),
      created_by:      input.created_by.clone(),
      created_by_type: input.created_by_type.clone(),
      session_id:      input.session_id.clone(),
    };

    let version = self
      .write(move |conn, deadline| insert_next_version(conn, &row, deadline))
      .await?;

    tracing::debug!(document_id = %input.document_id, version, "saved document");

    Ok(Document {
      document_id: input.document_id,
      doc_type: input.doc_type,
      name: input.name,
      namespace: input.namespace,
      version,
      metadata: input.metadata,
      body: Some(input.body),
      created_at,
      created_by: input.created_by,
      created_by_type: input.created_by_type,
      session_id: input.session_id,
      tags: Vec::new(),
    })
  }

  async fn get_by_version(
    &self,
    document_id: &str,
    version: u32,
    include_body: bool,
  ) -> Result<Option<Document>> {
    let sql = format!(
      "{} WHERE h.document_id = ?1 AND h.version = ?2",
      select_documents(include_body)
    );
    self.fetch_one(sql, vec![Value::from(document_id.to_owned()), Value::from(version)]).await
  }

  async fn get_by_tag(
    &self,
    document_id: &str,
    tag: &str,
    include_body: bool,
  ) -> Result<Option<Document>> {
    let sql = format!(
      "{} WHERE h.document_id = ?1
         AND h.version = (SELECT version FROM document_tags WHERE document_id = ?1 AND tag = ?2)",
      select_documents(include_body)
    );
    let args = vec![Value::from(document_id.to_owned()), Value::from(tag.to_owned())];
    self.fetch_one(sql, args).await
  }

  async fn get_latest(&self, document_id: &str, include_body: bool) -> Result<Option<Document>> {
    let sql = format!(
      "{} WHERE h.document_id = ?1 ORDER BY h.version DESC LIMIT 1",
      select_documents(include_body)
    );
    self.fetch_one(sql, vec![Value::from(document_id.to_owned())]).await
  }

  async fn list(&self, query: &DocumentQuery) -> Result<Page<Document>> {
    let size = query.page.effective_size();
    let cursor: Option<ListCursor> = query.page.cursor()?;

    // Build WHERE clause dynamically; `args` tracks the positional `?`s.
    let mut conds: Vec<&'static str> = vec![];
    let mut args: Vec<Value> = vec![];
    if let Some(ns) = &query.namespace {
      conds.push("h.namespace = ?");
      args.push(Value::from(ns.clone()));
    }
    if let Some(t) = &query.doc_type {
      conds.push("h.doc_type = ?");
      args.push(Value::from(t.clone()));
    }
    if let Some(s) = &query.session_id {
      conds.push("h.session_id = ?");
      args.push(Value::from(s.clone()));
    }
    if let Some(tag) = &query.tag {
      conds.push(
        "EXISTS (SELECT 1 FROM document_tags t
                 WHERE t.document_id = h.document_id AND t.version = h.version AND t.tag = ?)",
      );
      args.push(Value::from(tag.clone()));
    }
    if query.latest_only {
      conds.push(
        "h.version = (SELECT MAX(m.version) FROM document_headers m
                      WHERE m.document_id = h.document_id)",
      );
    }

    let count_sql = format!(
      "SELECT COUNT(*) FROM document_headers h {}",
      where_clause(&conds)
    );
    let count_args = args.clone();

    if let Some(c) = cursor {
      conds.push("(h.created_at, h.document_id, h.version) < (?, ?, ?)");
      args.push(Value::from(c.created_at));
      args.push(Value::from(c.document_id));
      args.push(Value::from(c.version));
    }
    args.push(Value::from(size as i64 + 1));

    let page_sql = format!(
      "{} {} ORDER BY h.created_at DESC, h.document_id DESC, h.version DESC LIMIT ?",
      select_documents(query.include_body),
      where_clause(&conds)
    );

    let (total, raws): (i64, Vec<RawDocument>) = self
      .call(move |conn| {
        let total: i64 =
          conn.query_row(&count_sql, params_from_iter(count_args.iter()), |r| r.get(0))?;
        let mut stmt = conn.prepare(&page_sql)?;
        let rows = stmt
          .query_map(params_from_iter(args.iter()), RawDocument::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, rows))
      })
      .await?;

    let docs = raws.into_iter().map(RawDocument::into_document).collect::<Result<Vec<_>>>()?;
    let (items, more) = take_page(docs, size);
    let next_page_token = match items.last() {
      Some(last) if more => Some(encode_cursor(&ListCursor {
        created_at:  encode_dt(last.created_at),
        document_id: last.document_id.clone(),
        version:     last.version,
      })?),
      _ => None,
    };

    Ok(Page { items, total_count: total as u64, next_page_token })
  }

  async fn list_versions(
    &self,
    document_id: &str,
    include_body: bool,
    page: &PageRequest,
  ) -> Result<Page<Document>> {
    let size = page.effective_size();
    let after: Option<u32> = page.cursor::<VersionCursor>()?.map(|c| c.version);
    let document_id = document_id.to_owned();
    let page_sql = format!(
      "{} WHERE h.document_id = ?1 AND (?2 IS NULL OR h.version < ?2)
       ORDER BY h.version DESC LIMIT ?3",
      select_documents(include_body)
    );

    let (total, raws): (i64, Vec<RawDocument>) = self
      .call(move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM document_headers WHERE document_id = ?1",
          params![document_id],
          |r| r.get(0),
        )?;
        let mut stmt = conn.prepare(&page_sql)?;
        let rows = stmt
          .query_map(params![document_id, after, size as i64 + 1], RawDocument::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, rows))
      })
      .await?;

    let docs = raws.into_iter().map(RawDocument::into_document).collect::<Result<Vec<_>>>()?;
    let (items, more) = take_page(docs, size);
    let next_page_token = match items.last() {
      Some(last) if more => Some(encode_cursor(&VersionCursor { version: last.version })?),
      _ => None,
    };

    Ok(Page { items, total_count: total as u64, next_page_token })
  }

  async fn session_documents(&self, query: &SessionQuery) -> Result<Vec<Document>> {
    let mut conds: Vec<String> = vec!["h.session_id = ?".to_owned()];
    let mut args: Vec<Value> = vec![Value::from(query.session_id.clone())];
    if !query.doc_types.is_empty() {
      let marks = vec!["?"; query.doc_types.len()].join(", ");
      conds.push(format!("h.doc_type IN ({marks})"));
      args.extend(query.doc_types.iter().cloned().map(Value::from));
    }
    if let Some(since) = query.since {
      conds.push("h.created_at >= ?".to_owned());
      args.push(Value::from(encode_dt(since)));
    }

    let sql = format!(
      "{} WHERE {}",
      select_documents(query.include_body),
      conds.join(" AND ")
    );

    let raws: Vec<RawDocument> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(args.iter()), RawDocument::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_document).collect()
  }

  async fn delete_version(
    &self,
    document_id: &str,
    version: u32,
    actor: &Actor,
    session_id: &str,
  ) -> Result<u64> {
    self.delete_versions(document_id, Some(version), actor, session_id).await
  }

  async fn delete_all(&self, document_id: &str, actor: &Actor, session_id: &str) -> Result<u64> {
    self.delete_versions(document_id, None, actor, session_id).await
  }

  async fn health_check(&self) -> bool {
    let probe = self
      .call(|conn| Ok(conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?))
      .await;
    match probe {
      Ok(_) => true,
      Err(e) => {
        tracing::warn!(error = %e, "storage health check failed");
        false
      }
    }
  }
}

fn where_clause<S: AsRef<str>>(conds: &[S]) -> String {
  if conds.is_empty() {
    String::new()
  } else {
    let joined: Vec<&str> = conds.iter().map(AsRef::as_ref).collect();
    format!("WHERE {}", joined.join(" AND "))
  }
}
