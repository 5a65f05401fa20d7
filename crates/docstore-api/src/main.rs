//! docstore-server binary.
//!
//! Reads `docstore.toml` (or the path given with `--config`), applies
//! `DOCSTORE__*` environment overrides, opens the SQLite store, and serves the
//! RPC surface over HTTP.
//!
//! ```text
//! DOCSTORE__PORT=9100 DOCSTORE__EVENT_BUS__KIND=http \
//!   DOCSTORE__EVENT_BUS__ENDPOINT=http://cdc:8080/events docstore-server
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use docstore_api::ServerConfig;
use docstore_service::{DocumentStoreService, Emitter, SequenceCounter};
use docstore_sqlite::{SqliteStore, StoreOptions};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Versioned document store server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "docstore.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("DOCSTORE")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read configuration")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let options = StoreOptions { timeout: Duration::from_millis(server_cfg.storage_timeout_ms) };
  let store = SqliteStore::open_with(&store_path, options)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let bus = server_cfg
    .event_bus
    .build()
    .context("failed to configure event bus")?;
  let emitter = Emitter::new(
    bus,
    SequenceCounter::new(),
    server_cfg.event_bus.retry_policy(),
    server_cfg.source_service.clone(),
    server_cfg.tenant_id.clone(),
  );
  tracing::info!(
    kind = ?server_cfg.event_bus.kind,
    source_service = %server_cfg.source_service,
    "event bus ready"
  );

  let service = DocumentStoreService::new(Arc::new(store), emitter);
  let app = docstore_api::rpc_router(service).layer(TraceLayer::new_for_http());
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
