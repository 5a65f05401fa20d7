//! The document store service: request validation, orchestration of the
//! repository and tag manager, and best-effort change-event emission.
//!
//! Transport concerns live in `docstore-api`; this crate only knows the
//! request/response shapes in [`rpc`].

pub mod bus;
pub mod emitter;
pub mod error;
pub mod rpc;
pub mod service;
mod validate;

pub use bus::{BroadcastBus, ConfiguredBus, EventBus, EventBusConfig, HttpBus};
pub use emitter::{Emitter, EventHooks, NoopHooks, RetryPolicy, SequenceCounter};
pub use error::{BusError, EmitError};
pub use service::DocumentStoreService;
