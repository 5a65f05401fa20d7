//! Async HTTP client for the document store RPC surface.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct RpcClient {
  client:   Client,
  base_url: String,
}

impl RpcClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url.trim_end_matches('/'), path)
  }

  /// `POST /rpc/<method>`. Returns the decoded response body whether or not
  /// the service flagged it as a failure.
  pub async fn call<Req: Serialize>(&self, method: &str, request: &Req) -> Result<Value> {
    let path = format!("/rpc/{method}");
    tracing::debug!(%method, "calling");
    let resp = self
      .client
      .post(self.url(&path))
      .json(request)
      .send()
      .await
      .with_context(|| format!("POST {path} failed"))?;

    let status = resp.status();
    let body: Value = resp
      .json()
      .await
      .with_context(|| format!("deserialising {method} response"))?;
    if !status.is_success() {
      let message = body["message"].as_str().unwrap_or_default();
      return Err(anyhow!("POST {path} → {status}: {message}"));
    }
    Ok(body)
  }

  /// `GET /health`
  pub async fn health(&self) -> Result<Value> {
    let resp = self
      .client
      .get(self.url("/health"))
      .send()
      .await
      .context("GET /health failed")?;
    resp.json().await.context("deserialising health response")
  }
}
