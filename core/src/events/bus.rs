use std::sync::Arc;

use tokio::sync::mpsc;

use super::BuildEvent;

/// Receives every event emitted by an executor. Called inline from the
/// executing task, so implementations should not block.
pub trait BuildObserver: Send + Sync {
    fn name(&self) -> &str;
    fn on_event(&self, event: &BuildEvent);
}

/// Forwards events into an unbounded channel for consumers that prefer a queue.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<BuildEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<BuildEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BuildEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl BuildObserver for ChannelObserver {
    fn name(&self) -> &str {
        "channel"
    }

    fn on_event(&self, event: &BuildEvent) {
        // receiver gone: nobody is listening any more
        let _ = self.tx.send(event.clone());
    }
}

/// Fan-out of events to the registered observers, in registration order.
#[derive(Clone, Default)]
pub struct EventBus {
    observers: Vec<Arc<dyn BuildObserver>>,
}

impl EventBus {
    pub fn new(observers: Vec<Arc<dyn BuildObserver>>) -> Self {
        Self { observers }
    }

    pub fn push(&mut self, observer: Arc<dyn BuildObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn emit(&self, event: BuildEvent) {
        tracing::trace!(target: "tierbuild.events", event = event.name(), build_id = %event.build_id());
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}
