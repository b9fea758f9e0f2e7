//! Civic Notify - notification delivery.
//!
//! The lifecycle hands every committed event to a [`NotificationEmitter`].
//! Delivery is fire-and-forget from the caller's point of view: a failing sink
//! is reported back as an error for logging, never as a reason to undo the
//! committed transition.
//!
//! Sinks provided here:
//! - [`InboxEmitter`]: per-user inbox with read state, de-duplicated by event id
//! - [`BroadcastEmitter`]: a tokio broadcast channel for live subscribers
//! - [`TracingEmitter`]: structured log line per event
//! - [`FanoutEmitter`]: delivers to several sinks in order

#![deny(unsafe_code)]

mod broadcast;
mod inbox;

pub use broadcast::BroadcastEmitter;
pub use inbox::{InboxEmitter, Notification, DEFAULT_INBOX_CAPACITY};

use async_trait::async_trait;
use civic_types::NotificationEvent;
use std::sync::Arc;
use thiserror::Error;

/// Delivery collaborator for lifecycle notifications.
#[async_trait]
pub trait NotificationEmitter: Send + Sync {
    async fn emit(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery through {sink} failed: {reason}")]
    Delivery { sink: &'static str, reason: String },

    #[error("notification not found: {0}")]
    NotFound(String),

    #[error("notification backend error: {0}")]
    Backend(String),
}

/// Writes one log line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEmitter;

#[async_trait]
impl NotificationEmitter for TracingEmitter {
    async fn emit(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        tracing::info!(
            notification_id = %event.id,
            complaint_id = %event.complaint_id,
            recipient = %event.recipient,
            kind = event.kind.as_str(),
            "{}",
            event.message
        );
        Ok(())
    }
}

/// Delivers every event to each sink in registration order.
///
/// A failing sink does not stop delivery to the remaining ones; the first
/// failure is returned once all sinks have been tried.
#[derive(Default, Clone)]
pub struct FanoutEmitter {
    sinks: Vec<Arc<dyn NotificationEmitter>>,
}

impl FanoutEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationEmitter>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationEmitter for FanoutEmitter {
    async fn emit(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let mut first_failure = None;
        for sink in &self.sinks {
            if let Err(err) = sink.emit(event).await {
                tracing::warn!(notification_id = %event.id, error = %err, "Sink rejected notification");
                first_failure.get_or_insert(err);
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
