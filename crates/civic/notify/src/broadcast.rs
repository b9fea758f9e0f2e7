use crate::{NotificationEmitter, NotifyError};
use async_trait::async_trait;
use civic_types::NotificationEvent;
use tokio::sync::broadcast;

/// Publishes events on a broadcast channel for live subscribers (the SSE
/// stream). Having no subscriber is not a failure.
#[derive(Clone)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<NotificationEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl NotificationEmitter for BroadcastEmitter {
    async fn emit(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        match self.tx.send(event.clone()) {
            Ok(receivers) => {
                tracing::trace!(notification_id = %event.id, receivers, "Broadcast notification");
            }
            Err(_) => {
                tracing::trace!(notification_id = %event.id, "No live subscribers");
            }
        }
        Ok(())
    }
}
