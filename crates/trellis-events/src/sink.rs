use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::event::WorkflowEvent;

/// Destination for lifecycle notifications.
///
/// Implementations must not block: `emit` is called from execution paths.
pub trait EventSink: Send + Sync {
  fn emit(&self, event: WorkflowEvent);
}

/// Shared handle to a sink, injected at construction time.
pub type SharedSink = Arc<dyn EventSink>;

/// Fans events out over a bounded broadcast channel.
///
/// Lagging or absent subscribers never block the emitter; a send into a
/// channel with no receivers is simply dropped.
pub struct BroadcastSink {
  tx: broadcast::Sender<WorkflowEvent>,
}

impl BroadcastSink {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  /// Subscribe to the event stream.
  pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
    self.tx.subscribe()
  }
}

impl EventSink for BroadcastSink {
  fn emit(&self, event: WorkflowEvent) {
    debug!(event = event.name(), payload = ?event, "event_emitted");
    // Err means no live receivers, which is fine.
    let _ = self.tx.send(event);
  }
}

/// Discards every event. Still records a tracing record per event.
#[derive(Default)]
pub struct NullSink;

impl EventSink for NullSink {
  fn emit(&self, event: WorkflowEvent) {
    debug!(event = event.name(), payload = ?event, "event_emitted");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn broadcast_delivers_to_subscriber() {
    let sink = BroadcastSink::new(16);
    let mut rx = sink.subscribe();

    sink.emit(WorkflowEvent::ProgressUpdate {
      execution_id: "e1".into(),
      progress: 50,
    });

    let event = rx.try_recv().expect("event should be buffered");
    assert_eq!(event.name(), "progress_update");
  }

  #[test]
  fn emit_without_subscribers_is_silent() {
    let sink = BroadcastSink::new(4);
    sink.emit(WorkflowEvent::ExecutionCompleted {
      execution_id: "e1".into(),
    });
  }
}
