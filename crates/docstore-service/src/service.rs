//! [`DocumentStoreService`], the request/response façade.
//!
//! Each call runs validate, execute, emit (best effort), respond. No state
//! survives between calls apart from the shared store handle and emitter.

use std::sync::Arc;

use chrono::Utc;
use docstore_core::{
  Error, Result,
  context::{self, ContextRequest, ScoredDocument},
  document::{Actor, Document, NewDocument},
  event::EventPayload,
  page::{Page, PageRequest},
  store::{DocumentQuery, DocumentRepository, TagManager, TagRequest},
  tag::{Tag, TagEvent},
};

use crate::{
  bus::EventBus,
  emitter::Emitter,
  rpc::{
    DeleteDocumentRequest, DeleteDocumentResponse, Failure, GetDocumentRequest,
    GetDocumentResponse, GetSessionContextRequest, GetSessionContextResponse,
    HealthCheckResponse, ListActiveTagsRequest, ListActiveTagsResponse,
    ListDocumentVersionsRequest, ListDocumentVersionsResponse, ListDocumentsRequest,
    ListDocumentsResponse, ListTagEventsRequest, ListTagEventsResponse, PutDocumentRequest,
    PutDocumentResponse, PutDocumentsRequest, PutDocumentsResponse, Receipt, TagDocumentRequest,
    TagDocumentResponse,
  },
  validate,
};

/// Stateless façade over a store implementing both [`DocumentRepository`] and
/// [`TagManager`], publishing through `B`.
///
/// Cloning is cheap; clones share the store and the emitter.
pub struct DocumentStoreService<S, B> {
  store:   Arc<S>,
  emitter: Arc<Emitter<B>>,
}

impl<S, B> Clone for DocumentStoreService<S, B> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), emitter: Arc::clone(&self.emitter) }
  }
}

/// Outcome of saving one document plus its requested tags.
struct Saved {
  document:   Document,
  tag_errors: Vec<String>,
}

impl Saved {
  fn message(&self) -> String {
    let mut msg = format!(
      "document {} saved as version {}",
      self.document.document_id, self.document.version
    );
    if !self.tag_errors.is_empty() {
      msg.push_str("; ");
      msg.push_str(&self.tag_errors.join("; "));
    }
    msg
  }
}

fn storage<E: Into<Error>>(err: E) -> Error { err.into() }

/// Log `err` at a level matching its kind and return the caller-facing text.
fn report(operation: &'static str, err: &Error) -> String {
  match err {
    Error::Validation(_) | Error::InvalidPageToken => {
      tracing::debug!(operation, error = %err, "request rejected");
    }
    e if e.is_not_found() => {
      tracing::debug!(operation, error = %err, "not found");
    }
    _ => {
      tracing::error!(operation, error = %err, "operation failed");
    }
  }
  err.to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
  value.filter(|s| !s.trim().is_empty())
}

impl<S, B> DocumentStoreService<S, B>
where
  S: DocumentRepository + TagManager,
  B: EventBus,
{
  pub fn new(store: Arc<S>, emitter: Emitter<B>) -> Self {
    Self { store, emitter: Arc::new(emitter) }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn emitter(&self) -> &Emitter<B> { &self.emitter }

  /// Publish without letting delivery affect the request. The emitter has
  /// already logged any failure.
  async fn emit(&self, actor: &Actor, session_id: &str, payload: EventPayload) {
    let _ = self.emitter.emit(actor, session_id, payload).await;
  }

  // ─── PutDocument / PutDocuments ───────────────────────────────────────────

  pub async fn put_document(&self, request: PutDocumentRequest) -> PutDocumentResponse {
    let document_id = request.document.document_id.clone();
    match self.save_one(request.document).await {
      Ok(saved) => PutDocumentResponse {
        success: true,
        message: saved.message(),
        document_id,
        version: saved.document.version,
      },
      Err(e) => PutDocumentResponse {
        document_id,
        ..PutDocumentResponse::failure(report("PutDocument", &e))
      },
    }
  }

  /// Each document is saved independently; one failure never aborts the
  /// rest, and every input yields exactly one receipt.
  pub async fn put_documents(&self, request: PutDocumentsRequest) -> PutDocumentsResponse {
    if request.documents.is_empty() {
      let err = Error::Validation("documents must not be empty".into());
      return PutDocumentsResponse::failure(report("PutDocuments", &err));
    }

    let total = request.documents.len();
    let mut receipts = Vec::with_capacity(total);
    for doc in request.documents {
      let document_id = doc.document_id.clone();
      let receipt = match self.save_one(doc).await {
        Ok(saved) => Receipt {
          success: true,
          document_id,
          version: saved.document.version,
          error_message: saved.tag_errors.join("; "),
        },
        Err(e) => Receipt {
          success: false,
          document_id,
          version: 0,
          error_message: report("PutDocuments", &e),
        },
      };
      receipts.push(receipt);
    }

    let saved = receipts.iter().filter(|r| r.success).count();
    PutDocumentsResponse {
      success: saved == total,
      message: format!("{saved} of {total} documents saved"),
      receipts,
    }
  }

  /// Save, announce, then apply any requested tags. A tag that fails to
  /// apply is reported but does not undo the save.
  async fn save_one(&self, mut input: NewDocument) -> Result<Saved> {
    validate::new_document(&input)?;
    let tags = std::mem::take(&mut input.tags);

    let mut document = self.store.save(input).await.map_err(storage)?;
    let actor = document.created_by();

    self
      .emit(&actor, &document.session_id, EventPayload::DocumentCreated {
        document_id: document.document_id.clone(),
        version:     document.version,
        doc_type:    document.doc_type.clone(),
        namespace:   document.namespace.clone(),
        name:        document.name.clone(),
      })
      .await;

    let hooks = self.emitter.hooks();
    if !document.session_id.is_empty() {
      hooks.session_context_changed(&document.session_id, &document.document_id);
    }
    hooks.semantic_analysis_triggered(&document);

    let mut tag_errors = Vec::new();
    for tag in tags {
      let request = TagRequest {
        document_id: document.document_id.clone(),
        version:     document.version,
        tag:         tag.clone(),
        actor:       actor.clone(),
        session_id:  document.session_id.clone(),
      };
      match self.apply_tag(&request).await {
        Ok(_) => document.tags.push(tag),
        Err(e) => {
          tag_errors.push(format!("tag {tag:?} not applied: {}", report("PutDocument", &e)));
        }
      }
    }
    document.tags.sort();
    document.tags.dedup();

    Ok(Saved { document, tag_errors })
  }

  async fn apply_tag(&self, request: &TagRequest) -> Result<Tag> {
    let tag = self.store.tag(request).await.map_err(storage)?;
    self
      .emit(&request.actor, &request.session_id, EventPayload::DocumentTagged {
        document_id: tag.document_id.clone(),
        version:     tag.version,
        tag:         tag.tag.clone(),
      })
      .await;
    Ok(tag)
  }

  // ─── TagDocument ──────────────────────────────────────────────────────────

  pub async fn tag_document(&self, request: TagDocumentRequest) -> TagDocumentResponse {
    match self.try_tag(request).await {
      Ok(tag) => TagDocumentResponse {
        success: true,
        message: format!(
          "tag {:?} now points at {} version {}",
          tag.tag, tag.document_id, tag.version
        ),
      },
      Err(e) => TagDocumentResponse::failure(report("TagDocument", &e)),
    }
  }

  async fn try_tag(&self, request: TagDocumentRequest) -> Result<Tag> {
    validate::require("document_id", &request.document_id)?;
    validate::require("tag", &request.tag)?;
    validate::require_version(request.version)?;
    let tag_request = TagRequest {
      document_id: request.document_id,
      version:     request.version,
      tag:         request.tag,
      actor:       Actor::new(request.tagged_by, request.tagged_by_type),
      session_id:  request.session_id,
    };
    self.apply_tag(&tag_request).await
  }

  // ─── DeleteDocument ───────────────────────────────────────────────────────

  pub async fn delete_document(&self, request: DeleteDocumentRequest) -> DeleteDocumentResponse {
    match self.try_delete(&request).await {
      Ok(deleted) => DeleteDocumentResponse {
        success:          true,
        message:          format!("deleted {deleted} version(s) of {}", request.document_id),
        versions_deleted: deleted,
      },
      Err(e) => DeleteDocumentResponse::failure(report("DeleteDocument", &e)),
    }
  }

  async fn try_delete(&self, request: &DeleteDocumentRequest) -> Result<u64> {
    validate::require("document_id", &request.document_id)?;
    if let Some(version) = request.version {
      validate::require_version(version)?;
    }

    let id = request.document_id.as_str();
    let actor = Actor::new(request.deleted_by.clone(), request.deleted_by_type.clone());
    let deleted = match request.version {
      Some(version) => self.store.delete_version(id, version, &actor, &request.session_id).await,
      None => self.store.delete_all(id, &actor, &request.session_id).await,
    }
    .map_err(storage)?;

    if deleted == 0 {
      return Err(match request.version {
        Some(version) => Error::VersionNotFound { document_id: id.to_owned(), version },
        None => Error::DocumentNotFound(id.to_owned()),
      });
    }

    self
      .emit(&actor, &request.session_id, EventPayload::DocumentDeleted {
        document_id:      id.to_owned(),
        version:          request.version,
        versions_deleted: deleted,
      })
      .await;
    Ok(deleted)
  }

  // ─── GetDocument ──────────────────────────────────────────────────────────

  pub async fn get_document(&self, request: GetDocumentRequest) -> GetDocumentResponse {
    match self.try_get(&request).await {
      Ok(document) => GetDocumentResponse {
        success:  true,
        message:  format!("found {} version {}", document.document_id, document.version),
        document: Some(document),
      },
      Err(e) => GetDocumentResponse::failure(report("GetDocument", &e)),
    }
  }

  async fn try_get(&self, request: &GetDocumentRequest) -> Result<Document> {
    validate::require("document_id", &request.document_id)?;
    let id = request.document_id.as_str();
    let tag = request.tag.as_deref().filter(|t| !t.trim().is_empty());

    let found = match (request.version, tag) {
      (Some(_), Some(_)) => {
        return Err(Error::Validation("specify either version or tag, not both".into()));
      }
      (Some(version), None) => {
        validate::require_version(version)?;
        self
          .store
          .get_by_version(id, version, request.include_body)
          .await
          .map_err(storage)?
          .ok_or_else(|| Error::VersionNotFound { document_id: id.to_owned(), version })?
      }
      (None, Some(tag)) => self
        .store
        .get_by_tag(id, tag, request.include_body)
        .await
        .map_err(storage)?
        .ok_or_else(|| Error::TagNotFound { document_id: id.to_owned(), tag: tag.to_owned() })?,
      (None, None) => self
        .store
        .get_latest(id, request.include_body)
        .await
        .map_err(storage)?
        .ok_or_else(|| Error::DocumentNotFound(id.to_owned()))?,
    };

    let actor = Actor::new(request.requested_by.clone(), request.requested_by_type.clone());
    self
      .emit(&actor, &request.session_id, EventPayload::DocumentAccessed {
        document_id: found.document_id.clone(),
        version:     found.version,
        via_tag:     tag.map(str::to_owned),
      })
      .await;
    Ok(found)
  }

  // ─── Listings ─────────────────────────────────────────────────────────────

  pub async fn list_documents(&self, request: ListDocumentsRequest) -> ListDocumentsResponse {
    let query = DocumentQuery {
      namespace:    non_blank(request.namespace),
      doc_type:     non_blank(request.doc_type),
      tag:          non_blank(request.tag),
      session_id:   non_blank(request.session_id),
      latest_only:  request.latest_only,
      include_body: request.include_body,
      page:         PageRequest::new(request.page_token, request.page_size),
    };

    match self.store.list(&query).await.map_err(storage) {
      Ok(page) => ListDocumentsResponse {
        success:         true,
        message:         format!("{} of {} document(s)", page.items.len(), page.total_count),
        documents:       page.items,
        total_count:     page.total_count,
        next_page_token: page.next_page_token,
      },
      Err(e) => ListDocumentsResponse::failure(report("ListDocuments", &e)),
    }
  }

  pub async fn list_document_versions(
    &self,
    request: ListDocumentVersionsRequest,
  ) -> ListDocumentVersionsResponse {
    match self.try_versions(request).await {
      Ok(page) => ListDocumentVersionsResponse {
        success:         true,
        message:         format!("{} of {} version(s)", page.items.len(), page.total_count),
        documents:       page.items,
        total_count:     page.total_count,
        next_page_token: page.next_page_token,
      },
      Err(e) => ListDocumentVersionsResponse::failure(report("ListDocumentVersions", &e)),
    }
  }

  async fn try_versions(&self, request: ListDocumentVersionsRequest) -> Result<Page<Document>> {
    validate::require("document_id", &request.document_id)?;
    let page = PageRequest::new(request.page_token, request.page_size);
    self
      .store
      .list_versions(&request.document_id, request.include_body, &page)
      .await
      .map_err(storage)
  }

  pub async fn list_active_tags(&self, request: ListActiveTagsRequest) -> ListActiveTagsResponse {
    match self.try_active_tags(request).await {
      Ok(page) => ListActiveTagsResponse {
        success:         true,
        message:         format!("{} of {} tag(s)", page.items.len(), page.total_count),
        tags:            page.items,
        total_count:     page.total_count,
        next_page_token: page.next_page_token,
      },
      Err(e) => ListActiveTagsResponse::failure(report("ListActiveTags", &e)),
    }
  }

  async fn try_active_tags(&self, request: ListActiveTagsRequest) -> Result<Page<Tag>> {
    validate::require("document_id", &request.document_id)?;
    let page = PageRequest::new(request.page_token, request.page_size);
    self
      .store
      .list_active_tags(&request.document_id, request.version, &page)
      .await
      .map_err(storage)
  }

  pub async fn list_tag_events(&self, request: ListTagEventsRequest) -> ListTagEventsResponse {
    match self.try_tag_events(request).await {
      Ok(page) => ListTagEventsResponse {
        success:         true,
        message:         format!("{} of {} event(s)", page.items.len(), page.total_count),
        events:          page.items,
        total_count:     page.total_count,
        next_page_token: page.next_page_token,
      },
      Err(e) => ListTagEventsResponse::failure(report("ListTagEvents", &e)),
    }
  }

  async fn try_tag_events(&self, request: ListTagEventsRequest) -> Result<Page<TagEvent>> {
    validate::require("document_id", &request.document_id)?;
    let page = PageRequest::new(request.page_token, request.page_size);
    let tag = request.tag.as_deref().filter(|t| !t.trim().is_empty());
    self
      .store
      .list_tag_events(&request.document_id, tag, &page)
      .await
      .map_err(storage)
  }

  // ─── GetSessionContext ────────────────────────────────────────────────────

  pub async fn get_session_context(
    &self,
    request: GetSessionContextRequest,
  ) -> GetSessionContextResponse {
    match self.try_context(request).await {
      Ok(documents) => GetSessionContextResponse {
        success:     true,
        message:     format!("{} document(s) in context", documents.len()),
        total_count: documents.len() as u64,
        documents,
      },
      Err(e) => GetSessionContextResponse::failure(report("GetSessionContext", &e)),
    }
  }

  async fn try_context(&self, request: GetSessionContextRequest) -> Result<Vec<ScoredDocument>> {
    validate::require("session_id", &request.session_id)?;
    let ctx = ContextRequest {
      session_id:   request.session_id,
      doc_types:    request.document_types.into_iter().filter(|t| !t.trim().is_empty()).collect(),
      since:        request.since,
      limit:        request.limit.unwrap_or(0),
      include_body: request.include_body,
    };
    let ranked = context::get_session_context(self.store.as_ref(), &ctx).await.map_err(storage)?;

    let actor = Actor::new(request.requested_by, request.requested_by_type);
    self
      .emit(&actor, &ctx.session_id, EventPayload::SessionContextAccessed {
        session_id:     ctx.session_id.clone(),
        document_types: ctx.doc_types.clone(),
        document_count: ranked.len(),
      })
      .await;
    Ok(ranked)
  }

  // ─── HealthCheck ──────────────────────────────────────────────────────────

  pub async fn health_check(&self) -> HealthCheckResponse {
    let healthy = self.store.health_check().await;
    HealthCheckResponse {
      healthy,
      status: if healthy { "SERVING" } else { "NOT_SERVING" }.to_owned(),
      timestamp: Utc::now(),
    }
  }
}
