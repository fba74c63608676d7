//! Trellis Events
//!
//! Typed lifecycle notifications for parsing, compilation, and execution.
//!
//! Every component that emits notifications takes an [`EventSink`] at
//! construction time. There is no global listener registry: callers decide
//! where events go by injecting a sink, which keeps test isolation trivial.
//!
//! [`BroadcastSink`] fans events out over a `tokio::sync::broadcast` channel
//! for live subscribers; [`NullSink`] discards them. Both also record each
//! event as a structured tracing record, so a subscriber is never required
//! for observability.

mod event;
mod sink;

pub use event::WorkflowEvent;
pub use sink::{BroadcastSink, EventSink, NullSink, SharedSink};
