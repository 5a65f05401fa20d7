//! JSON-over-HTTP RPC surface for the document store.
//!
//! Exposes an axum [`Router`] backed by a [`DocumentStoreService`]. Every RPC
//! method is a `POST /rpc/<Method>` taking and returning JSON.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = docstore_api::rpc_router(service).layer(TraceLayer::new_for_http());
//! ```

pub mod error;
pub mod handlers;

use std::path::PathBuf;

use axum::{
  Router,
  routing::{get, post},
};
use docstore_core::store::{DocumentRepository, TagManager};
use docstore_service::{DocumentStoreService, EventBus, EventBusConfig};
use serde::Deserialize;

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, layered from `docstore.toml` and
/// `DOCSTORE__*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  /// Upper bound on any single storage call.
  #[serde(default = "default_storage_timeout_ms")]
  pub storage_timeout_ms: u64,
  /// Stamped into every change event's `source_service`.
  #[serde(default = "default_source_service")]
  pub source_service:     String,
  #[serde(default = "default_tenant_id")]
  pub tenant_id:          String,
  #[serde(default)]
  pub event_bus:          EventBusConfig,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 9097 }
fn default_store_path() -> PathBuf { PathBuf::from("docstore.sqlite3") }
fn default_storage_timeout_ms() -> u64 { 5_000 }
fn default_source_service() -> String { "document-store".to_string() }
fn default_tenant_id() -> String { "default".to_string() }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               default_host(),
      port:               default_port(),
      store_path:         default_store_path(),
      storage_timeout_ms: default_storage_timeout_ms(),
      source_service:     default_source_service(),
      tenant_id:          default_tenant_id(),
      event_bus:          EventBusConfig::default(),
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the RPC router for `service`.
pub fn rpc_router<S, B>(service: DocumentStoreService<S, B>) -> Router<()>
where
  S: DocumentRepository + TagManager + 'static,
  B: EventBus + 'static,
{
  Router::new()
    // Documents
    .route("/rpc/PutDocument",          post(handlers::put_document::<S, B>))
    .route("/rpc/PutDocuments",         post(handlers::put_documents::<S, B>))
    .route("/rpc/GetDocument",          post(handlers::get_document::<S, B>))
    .route("/rpc/ListDocuments",        post(handlers::list_documents::<S, B>))
    .route("/rpc/ListDocumentVersions", post(handlers::list_document_versions::<S, B>))
    .route("/rpc/DeleteDocument",       post(handlers::delete_document::<S, B>))
    .route("/rpc/GetSessionContext",    post(handlers::get_session_context::<S, B>))
    // Tags
    .route("/rpc/TagDocument",          post(handlers::tag_document::<S, B>))
    .route("/rpc/ListActiveTags",       post(handlers::list_active_tags::<S, B>))
    .route("/rpc/ListTagEvents",        post(handlers::list_tag_events::<S, B>))
    // Health
    .route("/rpc/HealthCheck",          post(handlers::health_check::<S, B>))
    .route("/health",                   get(handlers::health::<S, B>))
    .with_state(service)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
