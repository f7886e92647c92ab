//! UI-agnostic controllers for the chat, backend lifecycle, status polling and
//! model selection.
//!
//! Operations that talk to the backend come in two shapes: an `async fn` that
//! awaits the request inline, and a `begin_*`/`finish_*` pair for front-ends
//! that run the request on a spawned task and feed the result back through
//! their event loop. Both shapes share the same state transitions.

pub mod chat;
pub mod lifecycle;
pub mod models;
pub mod poller;
pub mod status;

pub use chat::{ChatSession, SubmitRejection};
pub use lifecycle::{LifecycleController, LifecyclePhase, START_RECHECK_DELAY};
pub use models::ModelSelector;
pub use poller::StatusPoller;
pub use status::{StatusEntry, StatusLevel, StatusLog};

#[cfg(test)]
pub(crate) mod fake;
