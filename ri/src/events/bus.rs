//! Event Bus - fan-out delivery of pipeline events
//!
//! Every listener owns its own unbounded queue, so a slow listener never blocks
//! the producer or any other listener, and nothing is dropped. Emission pushes
//! to all queues under one lock, which gives every listener the same order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::types::EventLogEntry;

type ListenerTable = Mutex<HashMap<u64, mpsc::UnboundedSender<EventLogEntry>>>;

/// Central event bus for pipeline activity
///
/// The instrumentation emits into the bus; consumers (file logger, live views,
/// tests) subscribe to receive events.
pub struct EventBus {
    listeners: Arc<ListenerTable>,
    next_listener_id: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with no listeners
    pub fn new() -> Self {
        debug!("EventBus::new: creating event bus");
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Emit an event to all listeners
    ///
    /// Never blocks on a listener: delivery is a push onto each listener's queue.
    /// Listeners whose receiving side is gone are pruned.
    pub fn emit(&self, entry: EventLogEntry) {
        debug!(
            event_type = entry.event.event_type(),
            stage_id = entry.event.stage_id(),
            "EventBus::emit"
        );
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|id, tx| {
            let alive = tx.send(entry.clone()).is_ok();
            if !alive {
                debug!(listener_id = id, "EventBus::emit: pruning closed listener");
            }
            alive
        });
    }

    /// Subscribe to receive events
    ///
    /// Returns a listener that will receive all events emitted after this call
    /// returns. Events emitted before subscription are not replayed.
    pub fn subscribe(&self) -> Listener {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        debug!(listener_id = id, "EventBus::subscribe: new listener");
        Listener {
            id,
            rx,
            table: Arc::clone(&self.listeners),
        }
    }

    /// Get the number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        // Dropping the senders lets every listener drain and then see `None`
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Receiving side of one bus subscription
///
/// Dropping the listener (or calling [`Listener::close`]) unregisters it; no
/// event emitted afterwards reaches it.
pub struct Listener {
    id: u64,
    rx: mpsc::UnboundedReceiver<EventLogEntry>,
    table: Arc<ListenerTable>,
}

impl Listener {
    /// Wait for the next event; `None` once unregistered and drained
    pub async fn recv(&mut self) -> Option<EventLogEntry> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting
    pub fn try_recv(&mut self) -> Option<EventLogEntry> {
        self.rx.try_recv().ok()
    }

    /// Take every event currently queued
    pub fn drain(&mut self) -> Vec<EventLogEntry> {
        let mut out = Vec::new();
        while let Ok(entry) = self.rx.try_recv() {
            out.push(entry);
        }
        out
    }

    /// Unregister from the bus; already-queued events can still be received
    pub fn close(&mut self) {
        debug!(listener_id = self.id, "Listener::close: unregistering");
        self.table.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
        self.rx.close();
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}

/// Run a plain callback for every event on its own task
///
/// This is the sink interface for collaborators that persist or forward events.
/// The task ends when the returned handle is aborted or the bus is dropped.
pub fn spawn_sink<F>(bus: &EventBus, mut sink: F) -> JoinHandle<()>
where
    F: FnMut(&EventLogEntry) + Send + 'static,
{
    let mut listener = bus.subscribe();
    debug!(listener_id = listener.id, "spawn_sink: starting sink task");
    tokio::spawn(async move {
        while let Some(entry) = listener.recv().await {
            sink(&entry);
        }
        debug!("spawn_sink: listener closed, sink task exiting");
    })
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::new())
}
