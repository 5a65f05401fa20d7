//! The change event emitter.
//!
//! Builds the envelope for a payload and publishes it with a bounded number
//! of attempts. Failures are logged here and handed back to the caller, which
//! must treat them as non-fatal: delivery is never assumed.

use std::{
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use chrono::Utc;
use docstore_core::{
  document::{Actor, Document},
  event::{ChangeEvent, EventPayload},
};
use uuid::Uuid;

use crate::{bus::EventBus, error::EmitError};

// ─── Sequence ────────────────────────────────────────────────────────────────

/// Process-local monotonic counter for `ChangeEvent::sequence_number`.
///
/// Clones share the counter. Ordering holds within one process only.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter(Arc<AtomicU64>);

impl SequenceCounter {
  pub fn new() -> Self { Self::default() }

  /// The next number; the first call returns 1.
  pub fn next(&self) -> u64 { self.0.fetch_add(1, Ordering::Relaxed) + 1 }

  pub fn current(&self) -> u64 { self.0.load(Ordering::Relaxed) }
}

// ─── Retry ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total publish attempts per event, including the first.
  pub max_attempts: u32,
  /// Fixed pause between attempts.
  pub delay:        Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self { Self { max_attempts: 3, delay: Duration::from_millis(100) } }
}

// ─── Hooks ───────────────────────────────────────────────────────────────────

/// Best-effort secondary notifications fired after a document is created.
///
/// Every method defaults to a no-op. Implementations must not block and have
/// no way to fail the request that triggered them.
pub trait EventHooks: Send + Sync {
  /// The set of documents in `session_id` changed.
  fn session_context_changed(&self, _session_id: &str, _document_id: &str) {}

  /// A new version is available for downstream analysis.
  fn semantic_analysis_triggered(&self, _document: &Document) {}
}

/// The default [`EventHooks`]: does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl EventHooks for NoopHooks {}

// ─── Emitter ─────────────────────────────────────────────────────────────────

pub struct Emitter<B> {
  bus:            B,
  sequence:       SequenceCounter,
  retry:          RetryPolicy,
  source_service: String,
  tenant_id:      String,
  hooks:          Arc<dyn EventHooks>,
}

impl<B: EventBus> Emitter<B> {
  pub fn new(
    bus: B,
    sequence: SequenceCounter,
    retry: RetryPolicy,
    source_service: impl Into<String>,
    tenant_id: impl Into<String>,
  ) -> Self {
    Self {
      bus,
      sequence,
      retry,
      source_service: source_service.into(),
      tenant_id: tenant_id.into(),
      hooks: Arc::new(NoopHooks),
    }
  }

  pub fn with_hooks(mut self, hooks: Arc<dyn EventHooks>) -> Self {
    self.hooks = hooks;
    self
  }

  pub fn bus(&self) -> &B { &self.bus }

  pub fn hooks(&self) -> &dyn EventHooks { self.hooks.as_ref() }

  /// Wrap `payload` in a fresh envelope. Consumes one sequence number.
  pub fn envelope(&self, actor: &Actor, session_id: &str, payload: EventPayload) -> ChangeEvent {
    ChangeEvent {
      event_id:        Uuid::new_v4(),
      event_type:      payload.event_type().to_owned(),
      occurred_at:     Utc::now(),
      sequence_number: self.sequence.next(),
      source_service:  self.source_service.clone(),
      trace_id:        Uuid::new_v4(),
      correlation_id:  Uuid::new_v4(),
      actor:           actor.clone(),
      session_id:      session_id.to_owned(),
      tenant_id:       self.tenant_id.clone(),
      payload,
    }
  }

  /// Build and publish one event. Retries keep the same `event_id`, so
  /// consumers may see duplicates but can detect them.
  pub async fn emit(
    &self,
    actor: &Actor,
    session_id: &str,
    payload: EventPayload,
  ) -> Result<ChangeEvent, EmitError> {
    let event = self.envelope(actor, session_id, payload);
    let max_attempts = self.retry.max_attempts.max(1);

    let mut attempt = 1;
    loop {
      match self.bus.publish(&event).await {
        Ok(()) => {
          tracing::debug!(
            event_type = %event.event_type,
            event_id = %event.event_id,
            sequence = event.sequence_number,
            attempt,
            "event published"
          );
          return Ok(event);
        }
        Err(err) if attempt < max_attempts => {
          tracing::warn!(
            event_type = %event.event_type,
            event_id = %event.event_id,
            attempt,
            error = %err,
            "event publish failed, retrying"
          );
          attempt += 1;
          if !self.retry.delay.is_zero() {
            tokio::time::sleep(self.retry.delay).await;
          }
        }
        Err(err) => {
          tracing::error!(
            event_type = %event.event_type,
            event_id = %event.event_id,
            attempts = attempt,
            error = %err,
            "event dropped"
          );
          return Err(EmitError { event_type: event.event_type, attempts: attempt, last: err });
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicU32;

  use super::*;
  use crate::{BroadcastBus, error::BusError};

  /// Fails the first `failures` publishes, then succeeds.
  struct FlakyBus {
    failures: u32,
    calls:    AtomicU32,
  }

  impl EventBus for FlakyBus {
    async fn publish(&self, _event: &ChangeEvent) -> Result<(), BusError> {
      let n = self.calls.fetch_add(1, Ordering::SeqCst);
      if n < self.failures { Err(BusError::Rejected(503)) } else { Ok(()) }
    }
  }

  fn emitter<B: EventBus>(bus: B, attempts: u32) -> Emitter<B> {
    Emitter::new(
      bus,
      SequenceCounter::new(),
      RetryPolicy { max_attempts: attempts, delay: Duration::ZERO },
      "document-store",
      "default",
    )
  }

  fn tagged() -> EventPayload {
    EventPayload::DocumentTagged { document_id: "A".into(), version: 1, tag: "prod".into() }
  }

  #[tokio::test]
  async fn envelope_is_stamped() {
    let bus = BroadcastBus::new(8);
    let mut rx = bus.subscribe();
    let e = emitter(bus, 3);

    let actor = Actor::new("alice", "user");
    let sent = e.emit(&actor, "s1", tagged()).await.unwrap();
    let got = rx.recv().await.unwrap();

    assert_eq!(got, sent);
    assert_eq!(got.event_type, "document.tagged");
    assert_eq!(got.source_service, "document-store");
    assert_eq!(got.tenant_id, "default");
    assert_eq!(got.actor, actor);
    assert_eq!(got.session_id, "s1");
    assert_ne!(got.trace_id, got.correlation_id);
  }

  #[tokio::test]
  async fn sequence_numbers_increase() {
    let e = emitter(BroadcastBus::new(8), 1);
    let actor = Actor::default();
    let a = e.emit(&actor, "", tagged()).await.unwrap();
    let b = e.emit(&actor, "", tagged()).await.unwrap();
    assert_eq!(a.sequence_number, 1);
    assert_eq!(b.sequence_number, 2);
    assert_ne!(a.event_id, b.event_id);
  }

  #[tokio::test]
  async fn shared_counter_spans_emitters() {
    let seq = SequenceCounter::new();
    let a = Emitter::new(BroadcastBus::new(1), seq.clone(), RetryPolicy::default(), "a", "t");
    let b = Emitter::new(BroadcastBus::new(1), seq.clone(), RetryPolicy::default(), "b", "t");
    a.envelope(&Actor::default(), "", tagged());
    let second = b.envelope(&Actor::default(), "", tagged());
    assert_eq!(second.sequence_number, 2);
    assert_eq!(seq.current(), 2);
  }

  #[tokio::test]
  async fn transient_failures_are_retried() {
    let e = emitter(FlakyBus { failures: 2, calls: AtomicU32::new(0) }, 3);
    assert!(e.emit(&Actor::default(), "", tagged()).await.is_ok());
    assert_eq!(e.bus().calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn exhaustion_reports_attempts() {
    let e = emitter(FlakyBus { failures: u32::MAX, calls: AtomicU32::new(0) }, 3);
    let err = e.emit(&Actor::default(), "", tagged()).await.unwrap_err();
    assert_eq!(err.attempts, 3);
    assert_eq!(err.event_type, "document.tagged");
    assert_eq!(e.bus().calls.load(Ordering::SeqCst), 3);
  }
}
