//! `docstore`: command-line client for the document store.
//!
//! # Usage
//!
//! ```
//! docstore --url http://localhost:9097 put --id A --type knowledge_base --namespace ns --body '{}'
//! docstore get A --tag stable --body
//! docstore --config ~/.config/docstore/cli.toml context s1 --limit 5
//! ```

mod client;

use std::{io::Read as _, path::PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use client::RpcClient;
use docstore_core::document::{Metadata, NewDocument};
use docstore_service::rpc::{
  DeleteDocumentRequest, GetDocumentRequest, GetSessionContextRequest, ListActiveTagsRequest,
  ListDocumentVersionsRequest, ListDocumentsRequest, ListTagEventsRequest, PutDocumentRequest,
  TagDocumentRequest,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "http://localhost:9097";

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "docstore", about = "Command-line client for the document store")]
struct Args {
  /// Path to a TOML config file (url, actor, actor_type).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the server (default: http://localhost:9097).
  #[arg(long, env = "DOCSTORE_URL")]
  url: Option<String>,

  /// Actor recorded on writes and reads.
  #[arg(long, global = true, env = "DOCSTORE_ACTOR")]
  actor: Option<String>,

  /// Kind of actor (user, agent, system, ...).
  #[arg(long, global = true, env = "DOCSTORE_ACTOR_TYPE")]
  actor_type: Option<String>,

  /// Session the operation belongs to.
  #[arg(long, global = true, default_value = "")]
  session: String,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Save a new version of a document.
  Put {
    #[arg(long)]
    id:        String,
    #[arg(long = "type")]
    doc_type:  String,
    #[arg(long)]
    namespace: String,
    #[arg(long, default_value = "")]
    name:      String,
    /// Document body.
    #[arg(long, conflicts_with = "body_file", required_unless_present = "body_file")]
    body:      Option<String>,
    /// Read the body from a file, or `-` for stdin.
    #[arg(long, value_name = "PATH")]
    body_file: Option<PathBuf>,
    /// Metadata as a JSON object.
    #[arg(long)]
    metadata:  Option<String>,
    /// Tag to point at the new version; repeatable.
    #[arg(long = "tag")]
    tags:      Vec<String>,
  },
  /// Fetch one version: the latest, a specific one, or the one a tag names.
  Get {
    id:      String,
    #[arg(long, conflicts_with = "tag")]
    version: Option<u32>,
    #[arg(long)]
    tag:     Option<String>,
    /// Include the body.
    #[arg(long)]
    body:    bool,
  },
  /// List documents matching the given filters.
  List {
    #[arg(long)]
    namespace:   Option<String>,
    #[arg(long = "type")]
    doc_type:    Option<String>,
    #[arg(long)]
    tag:         Option<String>,
    /// Restrict to documents created in this session.
    #[arg(long)]
    in_session:  Option<String>,
    #[arg(long)]
    latest_only: bool,
    #[arg(long)]
    body:        bool,
    #[arg(long)]
    page_size:   Option<usize>,
    #[arg(long)]
    page_token:  Option<String>,
  },
  /// Point a tag at a version.
  Tag {
    id:      String,
    version: u32,
    tag:     String,
  },
  /// List the active tags of a document.
  Tags {
    id:         String,
    #[arg(long)]
    version:    Option<u32>,
    #[arg(long)]
    page_size:  Option<usize>,
    #[arg(long)]
    page_token: Option<String>,
  },
  /// Show the tag history of a document.
  Events {
    id:         String,
    #[arg(long)]
    tag:        Option<String>,
    #[arg(long)]
    page_size:  Option<usize>,
    #[arg(long)]
    page_token: Option<String>,
  },
  /// List every version of a document, newest first.
  Versions {
    id:         String,
    #[arg(long)]
    body:       bool,
    #[arg(long)]
    page_size:  Option<usize>,
    #[arg(long)]
    page_token: Option<String>,
  },
  /// Delete one version, or every version when `--version` is omitted.
  Delete {
    id:      String,
    #[arg(long)]
    version: Option<u32>,
  },
  /// Ranked documents of a session.
  Context {
    session_id: String,
    /// Restrict to these types; repeatable.
    #[arg(long = "type")]
    types:      Vec<String>,
    /// Only documents created at or after this RFC 3339 instant.
    #[arg(long)]
    since:      Option<DateTime<Utc>>,
    #[arg(long)]
    limit:      Option<usize>,
    #[arg(long)]
    body:       bool,
  },
  /// Check that the server can reach its store.
  Health,
}

// ─── Config file ─────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default, Debug)]
struct ConfigFile {
  #[serde(default)]
  url:        String,
  #[serde(default)]
  actor:      String,
  #[serde(default)]
  actor_type: String,
}

/// Flag, else non-empty file value, else `default`.
fn pick(flag: Option<String>, file: &str, default: &str) -> String {
  flag
    .or_else(|| (!file.is_empty()).then(|| file.to_string()))
    .unwrap_or_else(|| default.to_string())
}

fn read_body(body: Option<String>, body_file: Option<PathBuf>) -> Result<String> {
  match (body, body_file) {
    (Some(body), _) => Ok(body),
    (None, Some(path)) if path.as_os_str() == "-" => {
      let mut buf = String::new();
      std::io::stdin().read_to_string(&mut buf).context("reading body from stdin")?;
      Ok(buf)
    }
    (None, Some(path)) => std::fs::read_to_string(&path)
      .with_context(|| format!("reading body from {}", path.display())),
    (None, None) => bail!("one of --body or --body-file is required"),
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let url = pick(args.url, &file_cfg.url, DEFAULT_URL);
  let actor = pick(args.actor, &file_cfg.actor, "cli");
  let actor_type = pick(args.actor_type, &file_cfg.actor_type, "user");
  let session = args.session;

  let client = RpcClient::new(url)?;

  let response = match args.command {
    Command::Put { id, doc_type, namespace, name, body, body_file, metadata, tags } => {
      let metadata: Metadata = match metadata {
        Some(raw) => serde_json::from_str(&raw).context("--metadata must be a JSON object")?,
        None => Metadata::new(),
      };
      let document = NewDocument {
        document_id: id,
        doc_type,
        name,
        namespace,
        metadata,
        body: read_body(body, body_file)?,
        created_by: actor,
        created_by_type: actor_type,
        session_id: session,
        tags,
      };
      client.call("PutDocument", &PutDocumentRequest { document }).await?
    }
    Command::Get { id, version, tag, body } => {
      let request = GetDocumentRequest {
        document_id: id,
        version,
        tag,
        include_body: body,
        requested_by: actor,
        requested_by_type: actor_type,
        session_id: session,
      };
      client.call("GetDocument", &request).await?
    }
    Command::List {
      namespace,
      doc_type,
      tag,
      in_session,
      latest_only,
      body,
      page_size,
      page_token,
    } => {
      let request = ListDocumentsRequest {
        namespace,
        doc_type,
        tag,
        session_id: in_session,
        page_token,
        page_size,
        include_body: body,
        latest_only,
      };
      client.call("ListDocuments", &request).await?
    }
    Command::Tag { id, version, tag } => {
      let request = TagDocumentRequest {
        document_id: id,
        version,
        tag,
        tagged_by: actor,
        tagged_by_type: actor_type,
        session_id: session,
      };
      client.call("TagDocument", &request).await?
    }
    Command::Tags { id, version, page_size, page_token } => {
      let request = ListActiveTagsRequest { document_id: id, version, page_token, page_size };
      client.call("ListActiveTags", &request).await?
    }
    Command::Events { id, tag, page_size, page_token } => {
      let request = ListTagEventsRequest { document_id: id, tag, page_token, page_size };
      client.call("ListTagEvents", &request).await?
    }
    Command::Versions { id, body, page_size, page_token } => {
      let request = ListDocumentVersionsRequest {
        document_id: id,
        page_token,
        page_size,
        include_body: body,
      };
      client.call("ListDocumentVersions", &request).await?
    }
    Command::Delete { id, version } => {
      let request = DeleteDocumentRequest {
        document_id: id,
        version,
        deleted_by: actor,
        deleted_by_type: actor_type,
        session_id: session,
      };
      client.call("DeleteDocument", &request).await?
    }
    Command::Context { session_id, types, since, limit, body } => {
      let request = GetSessionContextRequest {
        session_id,
        document_types: types,
        since,
        limit,
        include_body: body,
        requested_by: actor,
        requested_by_type: actor_type,
      };
      client.call("GetSessionContext", &request).await?
    }
    Command::Health => client.health().await?,
  };

  println!("{}", serde_json::to_string_pretty(&response)?);
  check(&response)
}

/// Turn a flagged failure into a non-zero exit.
fn check(response: &Value) -> Result<()> {
  let ok = response
    .get("success")
    .or_else(|| response.get("healthy"))
    .and_then(Value::as_bool)
    .unwrap_or(false);
  if !ok {
    bail!("{}", response["message"].as_str().unwrap_or("request failed"));
  }
  Ok(())
}
