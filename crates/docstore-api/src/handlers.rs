//! One handler per RPC method.
//!
//! | Method | Path |
//! |--------|------|
//! | `POST` | `/rpc/PutDocument` |
//! | `POST` | `/rpc/PutDocuments` |
//! | `POST` | `/rpc/GetDocument` |
//! | `POST` | `/rpc/ListDocuments` |
//! | `POST` | `/rpc/GetSessionContext` |
//! | `POST` | `/rpc/TagDocument` |
//! | `POST` | `/rpc/ListActiveTags` |
//! | `POST` | `/rpc/ListTagEvents` |
//! | `POST` | `/rpc/ListDocumentVersions` |
//! | `POST` | `/rpc/DeleteDocument` |
//! | `POST` | `/rpc/HealthCheck` |
//! | `GET`  | `/health` | 503 when the store is unreachable |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use docstore_core::store::{DocumentRepository, TagManager};
use docstore_service::{
  DocumentStoreService, EventBus,
  rpc::{
    DeleteDocumentRequest, DeleteDocumentResponse, GetDocumentRequest, GetDocumentResponse,
    GetSessionContextRequest, GetSessionContextResponse, HealthCheckResponse,
    ListActiveTagsRequest, ListActiveTagsResponse, ListDocumentVersionsRequest,
    ListDocumentVersionsResponse, ListDocumentsRequest, ListDocumentsResponse,
    ListTagEventsRequest, ListTagEventsResponse, PutDocumentRequest, PutDocumentResponse,
    PutDocumentsRequest, PutDocumentsResponse, TagDocumentRequest, TagDocumentResponse,
  },
};

use crate::error::ApiError;

/// Each generated handler decodes the JSON body, forwards it to the service
/// method of the same name, and returns the response as JSON.
macro_rules! rpc_handlers {
  ($($method:ident: $req:ty => $resp:ty;)+) => {
    $(
      pub async fn $method<S, B>(
        State(service): State<DocumentStoreService<S, B>>,
        payload: Result<Json<$req>, JsonRejection>,
      ) -> Result<Json<$resp>, ApiError>
      where
        S: DocumentRepository + TagManager,
        B: EventBus,
      {
        let Json(request) = payload?;
        Ok(Json(service.$method(request).await))
      }
    )+
  };
}

rpc_handlers! {
  put_document:           PutDocumentRequest          => PutDocumentResponse;
  put_documents:          PutDocumentsRequest         => PutDocumentsResponse;
  get_document:           GetDocumentRequest          => GetDocumentResponse;
  list_documents:         ListDocumentsRequest        => ListDocumentsResponse;
  get_session_context:    GetSessionContextRequest    => GetSessionContextResponse;
  tag_document:           TagDocumentRequest          => TagDocumentResponse;
  list_active_tags:       ListActiveTagsRequest       => ListActiveTagsResponse;
  list_tag_events:        ListTagEventsRequest        => ListTagEventsResponse;
  list_document_versions: ListDocumentVersionsRequest => ListDocumentVersionsResponse;
  delete_document:        DeleteDocumentRequest       => DeleteDocumentResponse;
}

/// `POST /rpc/HealthCheck`. Always 200; the body says whether we are serving.
pub async fn health_check<S, B>(
  State(service): State<DocumentStoreService<S, B>>,
) -> Json<HealthCheckResponse>
where
  S: DocumentRepository + TagManager,
  B: EventBus,
{
  Json(service.health_check().await)
}

/// `GET /health`, for load balancers.
pub async fn health<S, B>(State(service): State<DocumentStoreService<S, B>>) -> impl IntoResponse
where
  S: DocumentRepository + TagManager,
  B: EventBus,
{
  let report = service.health_check().await;
  let status = if report.healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
  (status, Json(report))
}
