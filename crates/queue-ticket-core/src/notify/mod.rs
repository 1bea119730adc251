//! Best-effort notification of other subsystems.
//!
//! Publishing never blocks or fails a registration: [`Notifier`] hands the
//! message to a detached thread and only logs what goes wrong there.

use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Message announcing that a service point's queue changed.
pub const VISIT_UPDATED_MESSAGE: &str = "update visit";

/// Notification errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Bus unavailable: {0}")]
    Unavailable(String),

    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
}

/// A message bus the core can announce events on.
pub trait NotificationBus: Send + Sync {
    fn publish(&self, topic: &str, message: &str) -> Result<(), NotifyError>;
}

/// One message as seen by [`BroadcastBus`] subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    pub message: String,
    pub published_at: DateTime<Utc>,
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus.
///
/// Every subscriber receives every message. Slow subscribers lose the oldest
/// messages once the buffer is full.
pub struct BroadcastBus {
    sender: broadcast::Sender<BusMessage>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl NotificationBus for BroadcastBus {
    fn publish(&self, topic: &str, message: &str) -> Result<(), NotifyError> {
        let msg = BusMessage {
            topic: topic.to_string(),
            message: message.to_string(),
            published_at: Utc::now(),
        };
        // A send error only means nobody is subscribed right now.
        if self.sender.send(msg).is_err() {
            tracing::debug!(topic, "No subscribers for notification");
        }
        Ok(())
    }
}

/// Fire-and-forget dispatcher in front of a [`NotificationBus`].
#[derive(Clone)]
pub struct Notifier {
    bus: Arc<dyn NotificationBus>,
}

impl Notifier {
    pub fn new(bus: Arc<dyn NotificationBus>) -> Self {
        Self { bus }
    }

    /// Publish on a background thread.
    ///
    /// Returns the thread handle (callers normally drop it), or `None` if the
    /// thread could not be started. Failures are logged, never returned.
    pub fn dispatch(&self, topic: &str, message: &str) -> Option<JoinHandle<()>> {
        let bus = Arc::clone(&self.bus);
        let topic = topic.to_string();
        let message = message.to_string();

        let spawned = std::thread::Builder::new()
            .name("queue-notify".into())
            .spawn(move || match bus.publish(&topic, &message) {
                Ok(()) => tracing::debug!(topic = %topic, "Notification published"),
                Err(e) => tracing::warn!(topic = %topic, error = %e, "Notification failed"),
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Could not start notification thread");
                None
            }
        }
    }
}
