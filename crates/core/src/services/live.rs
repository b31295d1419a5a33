//! Live delivery of real-time events.
//!
//! Services call [`LiveDelivery::push`] only after their transaction has
//! committed. Delivery is best-effort: each send is bounded by a timeout and
//! failures are logged, never returned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use showcase_common::AppResult;
use showcase_db::entities::message;

use super::connection::{ConnectionHandle, ConnectionRegistry};

/// Events pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Something new is in the notification list. Carries no payload; the
    /// client refetches.
    Notification,
    /// A direct message arrived.
    NewMessage { message: message::Model },
    /// Echo of a message the user just sent.
    MessageSent { message: message::Model },
}

impl StreamEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::NewMessage { .. } => "new_message",
            Self::MessageSent { .. } => "message_sent",
        }
    }
}

/// Sends an event over one live connection.
///
/// Implemented by the real-time channel; the core never performs I/O itself.
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Deliver `event` to the connection behind `handle`.
    async fn send(&self, handle: ConnectionHandle, event: &StreamEvent) -> AppResult<()>;
}

/// Type alias for a shared transport.
pub type LiveTransportService = Arc<dyn LiveTransport>;

/// Transport that drops every event.
#[derive(Clone, Default)]
pub struct NoOpTransport;

#[async_trait]
impl LiveTransport for NoOpTransport {
    async fn send(&self, _handle: ConnectionHandle, _event: &StreamEvent) -> AppResult<()> {
        Ok(())
    }
}

/// Routes events to a user's live connections.
#[derive(Clone)]
pub struct LiveDelivery {
    registry: Arc<ConnectionRegistry>,
    transport: LiveTransportService,
    timeout: Duration,
}

impl LiveDelivery {
    /// Create a delivery front for `registry` over `transport`.
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        transport: LiveTransportService,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            timeout,
        }
    }

    /// The registry this delivery routes through.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Push `event` to every live connection of `user_id`.
    ///
    /// Returns how many connections accepted the event. An offline user is
    /// not an error.
    pub async fn push(&self, user_id: &str, event: &StreamEvent) -> usize {
        let handles = self.registry.connections(user_id).await;
        if handles.is_empty() {
            tracing::debug!(user_id = %user_id, event = event.name(), "User offline, push skipped");
            return 0;
        }

        let mut delivered = 0;
        for handle in handles {
            match tokio::time::timeout(self.timeout, self.transport.send(handle, event)).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(
                        error = %e,
                        user_id = %user_id,
                        handle = %handle,
                        event = event.name(),
                        "Failed to push live event"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        user_id = %user_id,
                        handle = %handle,
                        event = event.name(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Live push timed out"
                    );
                }
            }
        }
        delivered
    }
}
