//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use docstore_core::{
  document::{Actor, Metadata, NewDocument},
  page::PageRequest,
  store::{DocumentQuery, DocumentRepository, SessionQuery, TagManager, TagRequest},
  tag::TagOperation,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_doc(id: &str, doc_type: &str, body: &str) -> NewDocument {
  NewDocument {
    document_id: id.into(),
    doc_type: doc_type.into(),
    namespace: "ns".into(),
    body: body.into(),
    session_id: "s1".into(),
    ..NewDocument::default()
  }
}

fn tag_req(id: &str, version: u32, tag: &str) -> TagRequest {
  TagRequest {
    document_id: id.into(),
    version,
    tag: tag.into(),
    actor: Actor::new("alice", "user"),
    session_id: "s1".into(),
  }
}

// ─── Versioning ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn versions_are_contiguous_from_one() {
  let s = store().await;
  for expected in 1..=4 {
    let saved = s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
    assert_eq!(saved.version, expected);
  }

  let other = s.save(new_doc("B", "knowledge_base", "{}")).await.unwrap();
  assert_eq!(other.version, 1);

  let latest = s.get_latest("A", false).await.unwrap().unwrap();
  assert_eq!(latest.version, 4);
}

#[tokio::test]
async fn versions_continue_after_reopen() {
  let path = std::env::temp_dir().join(format!("docstore-{}.sqlite3", uuid::Uuid::new_v4()));

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
    s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  let saved = s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  assert_eq!(saved.version, 3);

  drop(s);
  let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn concurrent_saves_never_share_a_version() {
  let s = store().await;
  let mut handles = Vec::new();
  for _ in 0..10 {
    let s = s.clone();
    handles.push(tokio::spawn(async move {
      s.save(new_doc("race", "feedback", "{}")).await.unwrap().version
    }));
  }
  let mut versions = Vec::new();
  for h in handles {
    versions.push(h.await.unwrap());
  }
  versions.sort();
  assert_eq!(versions, (1..=10).collect::<Vec<u32>>());
}

#[tokio::test]
async fn saves_through_separate_connections_never_share_a_version() {
  let path = std::env::temp_dir().join(format!("docstore-{}.sqlite3", uuid::Uuid::new_v4()));
  let first = SqliteStore::open(&path).await.unwrap();
  let second = SqliteStore::open(&path).await.unwrap();

  let mut handles = Vec::new();
  for i in 0..20 {
    let s = if i % 2 == 0 { first.clone() } else { second.clone() };
    handles.push(tokio::spawn(async move {
      s.save(new_doc("shared", "feedback", "{}")).await.unwrap().version
    }));
  }
  let mut versions = Vec::new();
  for h in handles {
    versions.push(h.await.unwrap());
  }
  versions.sort();
  assert_eq!(versions, (1..=20).collect::<Vec<u32>>());

  drop((first, second));
  let _ = std::fs::remove_file(&path);
}

// ─── Write deadlines ─────────────────────────────────────────────────────────

#[tokio::test]
async fn expired_save_commits_nothing() {
  let s = store().await;
  let strict = s.clone().with_timeout(Duration::ZERO);

  let err = strict.save(new_doc("A", "knowledge_base", "{}")).await.unwrap_err();
  assert!(matches!(err, crate::Error::Timeout(_)), "{err:?}");
  assert!(s.get_latest("A", true).await.unwrap().is_none());

  let saved = s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  assert_eq!(saved.version, 1);
}

#[tokio::test]
async fn expired_tag_and_delete_change_nothing() {
  let s = store().await;
  s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  s.tag(&tag_req("A", 1, "stable")).await.unwrap();
  let strict = s.clone().with_timeout(Duration::ZERO);

  let err = strict.tag(&tag_req("A", 1, "prod")).await.unwrap_err();
  assert!(matches!(err, crate::Error::Timeout(_)), "{err:?}");
  let err = strict.delete_all("A", &Actor::new("carol", "user"), "s1").await.unwrap_err();
  assert!(matches!(err, crate::Error::Timeout(_)), "{err:?}");

  assert!(s.get_by_version("A", 1, false).await.unwrap().is_some());
  let active = s.list_active_tags("A", None, &PageRequest::default()).await.unwrap();
  let tags: Vec<_> = active.items.iter().map(|t| t.tag.as_str()).collect();
  assert_eq!(tags, ["stable"]);
  let events = s.list_tag_events("A", None, &PageRequest::default()).await.unwrap();
  assert_eq!(events.total_count, 1);
}

#[tokio::test]
async fn save_then_get_roundtrips() {
  let s = store().await;
  let mut metadata = Metadata::new();
  metadata.insert("source".into(), serde_json::json!("import"));
  metadata.insert("weight".into(), serde_json::json!(3));

  let input = NewDocument {
    name: "Runbook".into(),
    metadata,
    created_by: "bob".into(),
    created_by_type: "agent".into(),
    ..new_doc("A", "configuration", r#"{"steps":[1,2]}"#)
  };
  let saved = s.save(input.clone()).await.unwrap();
  let fetched = s.get_by_version("A", saved.version, true).await.unwrap().unwrap();

  assert_eq!(fetched, saved);
  assert_eq!(fetched.name, input.name);
  assert_eq!(fetched.metadata, input.metadata);
  assert_eq!(fetched.body.as_deref(), Some(input.body.as_str()));
  assert_eq!(fetched.created_by_type, "agent");
}

#[tokio::test]
async fn headers_only_omit_body() {
  let s = store().await;
  s.save(new_doc("A", "knowledge_base", "payload")).await.unwrap();
  let header = s.get_by_version("A", 1, false).await.unwrap().unwrap();
  assert!(header.body.is_none());
}

#[tokio::test]
async fn missing_lookups_return_none() {
  let s = store().await;
  assert!(s.get_latest("nope", true).await.unwrap().is_none());
  s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  assert!(s.get_by_version("A", 2, true).await.unwrap().is_none());
  assert!(s.get_by_tag("A", "prod", true).await.unwrap().is_none());
}

// ─── Tags ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn retagging_moves_pointer_and_appends_history() {
  let s = store().await;
  s.save(new_doc("A", "knowledge_base", "v1")).await.unwrap();
  s.save(new_doc("A", "knowledge_base", "v2")).await.unwrap();

  s.tag(&tag_req("A", 1, "prod")).await.unwrap();
  let doc = s.get_by_tag("A", "prod", true).await.unwrap().unwrap();
  assert_eq!(doc.version, 1);
  assert_eq!(doc.body.as_deref(), Some("v1"));

  s.tag(&tag_req("A", 2, "prod")).await.unwrap();
  let doc = s.get_by_tag("A", "prod", true).await.unwrap().unwrap();
  assert_eq!(doc.version, 2);

  let active = s.list_active_tags("A", None, &PageRequest::default()).await.unwrap();
  assert_eq!(active.total_count, 1);
  assert_eq!(active.items[0].version, 2);
  assert_eq!(active.items[0].updated_by, "alice");

  let events = s.list_tag_events("A", Some("prod"), &PageRequest::default()).await.unwrap();
  assert_eq!(events.total_count, 2);
  assert_eq!(events.items[0].version, 1);
  assert_eq!(events.items[1].version, 2);
  assert!(events.items.iter().all(|e| e.operation == TagOperation::Add));
}

#[tokio::test]
async fn tagging_missing_version_errors() {
  let s = store().await;
  s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();

  let err = s.tag(&tag_req("A", 7, "prod")).await.unwrap_err();
  assert!(matches!(err, crate::Error::VersionNotFound { version: 7, .. }));

  let events = s.list_tag_events("A", None, &PageRequest::default()).await.unwrap();
  assert_eq!(events.total_count, 0);
}

#[tokio::test]
async fn documents_carry_their_active_tags() {
  let s = store().await;
  s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  s.tag(&tag_req("A", 1, "stable")).await.unwrap();
  s.tag(&tag_req("A", 1, "beta")).await.unwrap();

  let doc = s.get_latest("A", false).await.unwrap().unwrap();
  assert_eq!(doc.tags, ["beta", "stable"]);

  let only_v1 = s.list_active_tags("A", Some(1), &PageRequest::default()).await.unwrap();
  assert_eq!(only_v1.total_count, 2);
  let none_v2 = s.list_active_tags("A", Some(2), &PageRequest::default()).await.unwrap();
  assert_eq!(none_v2.total_count, 0);
}

#[tokio::test]
async fn tag_events_paginate_in_insertion_order() {
  let s = store().await;
  s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  for tag in ["t1", "t2", "t3", "t4", "t5"] {
    s.tag(&tag_req("A", 1, tag)).await.unwrap();
  }

  let mut seen = Vec::new();
  let mut page = PageRequest::first(2);
  loop {
    let result = s.list_tag_events("A", None, &page).await.unwrap();
    assert_eq!(result.total_count, 5);
    seen.extend(result.items.into_iter().map(|e| e.tag));
    match result.next_page_token {
      Some(token) => page = PageRequest::new(Some(token), Some(2)),
      None => break,
    }
  }
  assert_eq!(seen, ["t1", "t2", "t3", "t4", "t5"]);
}

// ─── Deletion ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_version_leaves_others() {
  let s = store().await;
  for _ in 0..3 {
    s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  }
  let actor = Actor::new("carol", "user");

  assert_eq!(s.delete_version("A", 2, &actor, "s1").await.unwrap(), 1);
  assert!(s.get_by_version("A", 2, true).await.unwrap().is_none());
  assert!(s.get_by_version("A", 1, true).await.unwrap().is_some());
  assert!(s.get_by_version("A", 3, true).await.unwrap().is_some());

  assert_eq!(s.delete_version("A", 2, &actor, "s1").await.unwrap(), 0);
}

#[tokio::test]
async fn delete_cascades_tags_with_audit() {
  let s = store().await;
  s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  s.tag(&tag_req("A", 1, "stable")).await.unwrap();
  s.tag(&tag_req("A", 2, "prod")).await.unwrap();

  let actor = Actor::new("carol", "user");
  s.delete_version("A", 1, &actor, "s9").await.unwrap();

  assert!(s.get_by_tag("A", "stable", false).await.unwrap().is_none());
  assert!(s.get_by_tag("A", "prod", false).await.unwrap().is_some());

  let history = s.list_tag_events("A", Some("stable"), &PageRequest::default()).await.unwrap();
  let ops: Vec<_> = history.items.iter().map(|e| e.operation).collect();
  assert_eq!(ops, [TagOperation::Add, TagOperation::Remove]);
  assert_eq!(history.items[1].actor, "carol");
  assert_eq!(history.items[1].session_id, "s9");
}

#[tokio::test]
async fn delete_all_removes_every_version() {
  let s = store().await;
  for _ in 0..3 {
    s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  }
  s.save(new_doc("B", "knowledge_base", "{}")).await.unwrap();

  let actor = Actor::new("carol", "user");
  assert_eq!(s.delete_all("A", &actor, "").await.unwrap(), 3);
  assert!(s.get_latest("A", false).await.unwrap().is_none());
  assert!(s.get_latest("B", false).await.unwrap().is_some());

  // Version numbering restarts only because no stored version remains.
  assert_eq!(s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap().version, 1);
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_filters_and_collapses_to_latest() {
  let s = store().await;
  s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  s.save(new_doc("B", "feedback", "{}")).await.unwrap();
  s.save(NewDocument { namespace: "other".into(), ..new_doc("C", "knowledge_base", "{}") })
    .await
    .unwrap();

  let all = s.list(&DocumentQuery::default()).await.unwrap();
  assert_eq!(all.total_count, 4);

  let latest = s
    .list(&DocumentQuery { namespace: Some("ns".into()), latest_only: true, ..Default::default() })
    .await
    .unwrap();
  assert_eq!(latest.total_count, 2);
  let a = latest.items.iter().find(|d| d.document_id == "A").unwrap();
  assert_eq!(a.version, 2);

  let feedback = s
    .list(&DocumentQuery { doc_type: Some("feedback".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(feedback.items.len(), 1);
  assert_eq!(feedback.items[0].document_id, "B");
}

#[tokio::test]
async fn list_by_tag() {
  let s = store().await;
  s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  s.save(new_doc("B", "knowledge_base", "{}")).await.unwrap();
  s.tag(&tag_req("A", 1, "prod")).await.unwrap();

  let prod = s
    .list(&DocumentQuery { tag: Some("prod".into()), include_body: true, ..Default::default() })
    .await
    .unwrap();
  assert_eq!(prod.total_count, 1);
  assert_eq!(prod.items[0].version, 1);
  assert!(prod.items[0].body.is_some());
}

#[tokio::test]
async fn list_pages_newest_first_without_overlap() {
  let s = store().await;
  for i in 0..7 {
    s.save(new_doc(&format!("d{i}"), "knowledge_base", "{}")).await.unwrap();
  }

  let mut seen = Vec::new();
  let mut query = DocumentQuery { page: PageRequest::first(3), ..Default::default() };
  loop {
    let page = s.list(&query).await.unwrap();
    assert_eq!(page.total_count, 7);
    assert!(page.items.len() <= 3);
    seen.extend(page.items.into_iter().map(|d| (d.created_at, d.document_id)));
    match page.next_page_token {
      Some(token) => query.page = PageRequest::new(Some(token), Some(3)),
      None => break,
    }
  }

  assert_eq!(seen.len(), 7);
  for pair in seen.windows(2) {
    assert!(pair[0] > pair[1]);
  }
}

#[tokio::test]
async fn list_rejects_bad_token() {
  let s = store().await;
  let query =
    DocumentQuery { page: PageRequest::new(Some("%%%".into()), None), ..Default::default() };
  let err = s.list(&query).await.unwrap_err();
  assert!(matches!(err, crate::Error::Core(docstore_core::Error::InvalidPageToken)));
}

#[tokio::test]
async fn list_versions_newest_first() {
  let s = store().await;
  for _ in 0..5 {
    s.save(new_doc("A", "knowledge_base", "{}")).await.unwrap();
  }

  let first = s.list_versions("A", false, &PageRequest::first(2)).await.unwrap();
  assert_eq!(first.total_count, 5);
  assert_eq!(first.items.iter().map(|d| d.version).collect::<Vec<_>>(), [5, 4]);

  let second = s
    .list_versions("A", false, &PageRequest::new(first.next_page_token, Some(2)))
    .await
    .unwrap();
  assert_eq!(second.items.iter().map(|d| d.version).collect::<Vec<_>>(), [3, 2]);
}

// ─── Session candidates ──────────────────────────────────────────────────────

#[tokio::test]
async fn session_documents_filter_by_type_and_since() {
  let s = store().await;
  s.save(new_doc("log", "interaction_log", "{}")).await.unwrap();
  s.save(new_doc("kb", "knowledge_base", "{}")).await.unwrap();
  s.save(NewDocument { session_id: "s2".into(), ..new_doc("x", "feedback", "{}") })
    .await
    .unwrap();

  let all = s
    .session_documents(&SessionQuery { session_id: "s1".into(), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(all.len(), 2);

  let logs = s
    .session_documents(&SessionQuery {
      session_id: "s1".into(),
      doc_types: vec!["interaction_log".into()],
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(logs.len(), 1);
  assert_eq!(logs[0].document_id, "log");

  let future = s
    .session_documents(&SessionQuery {
      session_id: "s1".into(),
      since: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(future.is_empty());
}

#[tokio::test]
async fn health_check_reports_ok() {
  let s = store().await;
  assert!(s.health_check().await);
}
