//! [`TagManager`] for [`SqliteStore`]: the alias table and its history.

use docstore_core::{
  page::{Page, PageRequest, encode_cursor},
  store::{TagManager, TagRequest},
  tag::{Tag, TagEvent, TagOperation},
};
use rusqlite::{OptionalExtension as _, TransactionBehavior, params};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result, SqliteStore,
  encode::{RawTag, RawTagEvent, encode_dt, now},
};

#[derive(Debug, Serialize, Deserialize)]
struct TagCursor {
  tag: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TagEventCursor {
  event_id: i64,
}

impl TagManager for SqliteStore {
  type Error = Error;

  async fn tag(&self, request: &TagRequest) -> Result<Tag> {
    let tag = Tag {
      document_id:     request.document_id.clone(),
      tag:             request.tag.clone(),
      version:         request.version,
      updated_at:      now(),
      updated_by:      request.actor.id.clone(),
      updated_by_type: request.actor.kind.clone(),
      session_id:      request.session_id.clone(),
    };

    let row = tag.clone();
    let at_str = encode_dt(tag.updated_at);

    let applied: bool = self
      .write(move |conn, deadline| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM document_headers WHERE document_id = ?1 AND version = ?2",
            params![row.document_id, row.version],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(false);
        }

        tx.execute(
          "INSERT INTO document_tags
             (tag, document_id, version, updated_at, updated_by, updated_by_type, session_id)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (tag, document_id) DO UPDATE SET
             version         = excluded.version,
             updated_at      = excluded.updated_at,
             updated_by      = excluded.updated_by,
             updated_by_type = excluded.updated_by_type,
             session_id      = excluded.session_id",
          params![
            row.tag,
            row.document_id,
            row.version,
            at_str,
            row.updated_by,
            row.updated_by_type,
            row.session_id,
          ],
        )?;
        tx.execute(
          "INSERT INTO tag_events
             (document_id, version, tag, operation, actor, actor_type, session_id, occurred_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![
            row.document_id,
            row.version,
            row.tag,
            TagOperation::Add.as_ref(),
            row.updated_by,
            row.updated_by_type,
            row.session_id,
            at_str,
          ],
        )?;

        deadline.check()?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !applied {
      return Err(Error::VersionNotFound {
        document_id: request.document_id.clone(),
        version:     request.version,
      });
    }

    tracing::debug!(
      document_id = %tag.document_id,
      tag = %tag.tag,
      version = tag.version,
      "tagged"
    );
    Ok(tag)
  }

  async fn list_active_tags(
    &self,
    document_id: &str,
    version: Option<u32>,
    page: &PageRequest,
  ) -> Result<Page<Tag>> {
    let size = page.effective_size();
    let after: Option<String> = page.cursor::<TagCursor>()?.map(|c| c.tag);
    let document_id = document_id.to_owned();

    let (total, raws): (i64, Vec<RawTag>) = self
      .call(move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM document_tags
           WHERE document_id = ?1 AND (?2 IS NULL OR version = ?2)",
          params![document_id, version],
          |r| r.get(0),
        )?;
        let mut stmt = conn.prepare(
          "SELECT document_id, tag, version, updated_at, updated_by, updated_by_type, session_id
           FROM document_tags
           WHERE document_id = ?1 AND (?2 IS NULL OR version = ?2) AND (?3 IS NULL OR tag > ?3)
           ORDER BY tag
           LIMIT ?4",
        )?;
        let rows = stmt
          .query_map(params![document_id, version, after, size as i64 + 1], RawTag::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, rows))
      })
      .await?;

    let mut items = raws.into_iter().map(RawTag::into_tag).collect::<Result<Vec<_>>>()?;
    let more = items.len() > size;
    items.truncate(size);
    let next_page_token = match items.last() {
      Some(last) if more => Some(encode_cursor(&TagCursor { tag: last.tag.clone() })?),
      _ => None,
    };

    Ok(Page { items, total_count: total as u64, next_page_token })
  }

  async fn list_tag_events(
    &self,
    document_id: &str,
    tag: Option<&str>,
    page: &PageRequest,
  ) -> Result<Page<TagEvent>> {
    let size = page.effective_size();
    let after: Option<i64> = page.cursor::<TagEventCursor>()?.map(|c| c.event_id);
    let document_id = document_id.to_owned();
    let tag = tag.map(str::to_owned);

    let (total, raws): (i64, Vec<RawTagEvent>) = self
      .call(move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM tag_events WHERE document_id = ?1 AND (?2 IS NULL OR tag = ?2)",
          params![document_id, tag],
          |r| r.get(0),
        )?;
        let mut stmt = conn.prepare(
          "SELECT event_id, document_id, version, tag, operation, actor, actor_type,
                  session_id, occurred_at
           FROM tag_events
           WHERE document_id = ?1 AND (?2 IS NULL OR tag = ?2) AND (?3 IS NULL OR event_id > ?3)
           ORDER BY event_id
           LIMIT ?4",
        )?;
        let rows = stmt
          .query_map(params![document_id, tag, after, size as i64 + 1], RawTagEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, rows))
      })
      .await?;

    let mut items = raws.into_iter().map(RawTagEvent::into_event).collect::<Result<Vec<_>>>()?;
    let more = items.len() > size;
    items.truncate(size);
    let next_page_token = match items.last() {
      Some(last) if more => Some(encode_cursor(&TagEventCursor { event_id: last.event_id })?),
      _ => None,
    };

    Ok(Page { items, total_count: total as u64, next_page_token })
  }
}
