//! Event bus clients.
//!
//! [`EventBus`] is the seam between the emitter and whatever carries events
//! out of the process. Two implementations ship here: an in-process
//! [`BroadcastBus`] for embedded subscribers, and an [`HttpBus`] that posts
//! each envelope as JSON to a CDC collector.

use std::{future::Future, time::Duration};

use docstore_core::event::ChangeEvent;
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::{emitter::RetryPolicy, error::BusError};

/// Publishes one envelope. Implementations make a single attempt; retrying is
/// the emitter's job.
pub trait EventBus: Send + Sync {
  fn publish<'a>(
    &'a self,
    event: &'a ChangeEvent,
  ) -> impl Future<Output = Result<(), BusError>> + Send + 'a;
}

// ─── Broadcast ───────────────────────────────────────────────────────────────

/// In-process fan-out over a tokio broadcast channel.
///
/// Publishing with no subscribers is not an error: the event is dropped.
#[derive(Clone)]
pub struct BroadcastBus {
  tx: broadcast::Sender<ChangeEvent>,
}

impl BroadcastBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity.max(1));
    Self { tx }
  }

  /// Each subscriber gets its own independent stream.
  pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> { self.tx.subscribe() }

  pub fn subscriber_count(&self) -> usize { self.tx.receiver_count() }
}

impl EventBus for BroadcastBus {
  async fn publish(&self, event: &ChangeEvent) -> Result<(), BusError> {
    let delivered = self.tx.send(event.clone()).unwrap_or(0);
    tracing::trace!(event_id = %event.event_id, delivered, "broadcast event");
    Ok(())
  }
}

// ─── HTTP ────────────────────────────────────────────────────────────────────

/// Posts each envelope as JSON to `endpoint`. Non-2xx responses count as a
/// failed attempt.
#[derive(Clone)]
pub struct HttpBus {
  client:   reqwest::Client,
  endpoint: String,
}

impl HttpBus {
  pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BusError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, endpoint: endpoint.into() })
  }
}

impl EventBus for HttpBus {
  async fn publish(&self, event: &ChangeEvent) -> Result<(), BusError> {
    let resp = self.client.post(&self.endpoint).json(event).send().await?;
    if !resp.status().is_success() {
      return Err(BusError::Rejected(resp.status().as_u16()));
    }
    Ok(())
  }
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
  #[default]
  Broadcast,
  Http,
}

/// The `event_bus` section of the server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EventBusConfig {
  #[serde(default)]
  pub kind:           BusKind,
  /// Required when `kind = "http"`.
  #[serde(default)]
  pub endpoint:       Option<String>,
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms:     u64,
  #[serde(default = "default_max_attempts")]
  pub max_attempts:   u32,
  #[serde(default = "default_retry_delay_ms")]
  pub retry_delay_ms: u64,
  #[serde(default = "default_capacity")]
  pub capacity:       usize,
}

fn default_timeout_ms() -> u64 { 2_000 }
fn default_max_attempts() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 100 }
fn default_capacity() -> usize { 256 }

impl Default for EventBusConfig {
  fn default() -> Self {
    Self {
      kind:           BusKind::default(),
      endpoint:       None,
      timeout_ms:     default_timeout_ms(),
      max_attempts:   default_max_attempts(),
      retry_delay_ms: default_retry_delay_ms(),
      capacity:       default_capacity(),
    }
  }
}

impl EventBusConfig {
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.max_attempts.max(1),
      delay:        Duration::from_millis(self.retry_delay_ms),
    }
  }

  pub fn build(&self) -> Result<ConfiguredBus, BusError> {
    match self.kind {
      BusKind::Broadcast => Ok(ConfiguredBus::Broadcast(BroadcastBus::new(self.capacity))),
      BusKind::Http => {
        let endpoint = self
          .endpoint
          .clone()
          .filter(|e| !e.trim().is_empty())
          .ok_or_else(|| {
            BusError::Config("event_bus.endpoint is required for kind = \"http\"".into())
          })?;
        Ok(ConfiguredBus::Http(HttpBus::new(endpoint, Duration::from_millis(self.timeout_ms))?))
      }
    }
  }
}

/// The bus selected by configuration at startup.
#[derive(Clone)]
pub enum ConfiguredBus {
  Broadcast(BroadcastBus),
  Http(HttpBus),
}

impl EventBus for ConfiguredBus {
  async fn publish(&self, event: &ChangeEvent) -> Result<(), BusError> {
    match self {
      Self::Broadcast(bus) => bus.publish(event).await,
      Self::Http(bus) => bus.publish(event).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn http_bus_requires_endpoint() {
    let cfg = EventBusConfig { kind: BusKind::Http, ..EventBusConfig::default() };
    assert!(matches!(cfg.build(), Err(BusError::Config(_))));
  }

  #[test]
  fn defaults_match_documented_values() {
    let cfg: EventBusConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(cfg.kind, BusKind::Broadcast);
    assert_eq!(cfg.max_attempts, 3);
    assert_eq!(cfg.retry_policy().delay, Duration::from_millis(100));
  }

  #[test]
  fn zero_attempts_still_tries_once() {
    let cfg = EventBusConfig { max_attempts: 0, ..EventBusConfig::default() };
    assert_eq!(cfg.retry_policy().max_attempts, 1);
  }
}
