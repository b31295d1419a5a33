//! WebSocket streaming API.
//!
//! One socket is one [`ConnectionHandle`]. A socket authenticates either with
//! the `i` query parameter or with an `authenticate` frame; only then is it
//! registered and able to send anything else. Closing the socket unregisters
//! the handle.

#![allow(missing_docs)]

use std::collections::HashMap;

use async_trait::async_trait;
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use showcase_common::{AppError, AppResult};
use showcase_core::{ConnectionHandle, LiveTransport, SendMessageInput, StreamEvent};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::extractors::MaybeAuthUser;
use crate::middleware::AppState;

/// Streaming query parameters.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Access token for authentication.
    #[serde(rename = "i")]
    pub token: Option<String>,
}

/// Client-to-server frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind this socket to the token's user.
    Authenticate { token: String },
    /// Send a direct message.
    PrivateMessage(SendMessageInput),
    /// Mark every notification as read.
    ReadNotifications,
}

/// Server-to-client frame that is not a live event.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The socket is now registered for this user.
    Authenticated { user_id: String },
    /// A client frame failed.
    Error { code: String, message: String },
}

impl ServerMessage {
    fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Serialize as a text frame.
    #[must_use]
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<&AppError> for ServerMessage {
    fn from(err: &AppError) -> Self {
        Self::error(err.error_code(), err.to_string())
    }
}

/// Live transport over the open WebSocket connections.
///
/// Each socket task owns the receiving half of an outbox; pushing an event
/// only enqueues the serialized frame, so it never waits on the network.
#[derive(Default)]
pub struct WsTransport {
    outboxes: RwLock<HashMap<ConnectionHandle, mpsc::UnboundedSender<String>>>,
}

impl WsTransport {
    /// Create a transport with no sockets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route frames for `handle` into `outbox`.
    pub async fn attach(&self, handle: ConnectionHandle, outbox: mpsc::UnboundedSender<String>) {
        self.outboxes.write().await.insert(handle, outbox);
    }

    /// Forget the outbox of `handle`.
    pub async fn detach(&self, handle: ConnectionHandle) {
        self.outboxes.write().await.remove(&handle);
    }

    /// Number of attached sockets.
    pub async fn socket_count(&self) -> usize {
        self.outboxes.read().await.len()
    }
}

#[async_trait]
impl LiveTransport for WsTransport {
    async fn send(&self, handle: ConnectionHandle, event: &StreamEvent) -> AppResult<()> {
        let frame = serde_json::to_string(event).map_err(|e| AppError::Internal(e.to_string()))?;

        let outboxes = self.outboxes.read().await;
        let outbox = outboxes
            .get(&handle)
            .ok_or_else(|| AppError::Delivery(format!("No socket for connection {handle}")))?;

        outbox
            .send(frame)
            .map_err(|_| AppError::Delivery(format!("Socket {handle} is closed")))
    }
}

/// Protocol state of one socket.
pub struct StreamSession {
    handle: ConnectionHandle,
    user_id: Option<String>,
}

impl StreamSession {
    /// Start an unauthenticated session.
    #[must_use]
    pub fn new(handle: ConnectionHandle) -> Self {
        Self {
            handle,
            user_id: None,
        }
    }

    /// The socket's connection handle.
    #[must_use]
    pub const fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    /// The authenticated user, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Register this socket for an already verified user.
    pub async fn bind(&mut self, state: &AppState, user_id: String) -> ServerMessage {
        let came_online = state.registry.register(&user_id, self.handle).await;
        info!(user_id = %user_id, handle = %self.handle, came_online, "Streaming client authenticated");
        self.user_id = Some(user_id.clone());
        ServerMessage::Authenticated { user_id }
    }

    /// Verify `token` and register this socket for its user.
    pub async fn authenticate(&mut self, state: &AppState, token: &str) -> ServerMessage {
        match state.verifier.decode(token) {
            Ok(user_id) => self.bind(state, user_id).await,
            Err(e) => {
                warn!(handle = %self.handle, "Streaming auth failed");
                ServerMessage::from(&e)
            }
        }
    }

    /// Handle one text frame. Returns the reply frame, if any.
    pub async fn handle_text(&mut self, state: &AppState, text: &str) -> Option<String> {
        let msg = match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "Failed to parse client message");
                return Some(ServerMessage::error("INVALID_MESSAGE", e.to_string()).to_frame());
            }
        };

        let msg = match msg {
            ClientMessage::Authenticate { token } => {
                return Some(self.authenticate(state, &token).await.to_frame());
            }
            other => other,
        };

        let Some(user_id) = self.user_id.clone() else {
            return Some(ServerMessage::from(&AppError::Unauthorized).to_frame());
        };

        let result = match msg {
            ClientMessage::PrivateMessage(input) => state
                .messaging_service
                .send(&user_id, input)
                .await
                .map(|_| ()),
            ClientMessage::ReadNotifications => state
                .notification_service
                .mark_all_read(&user_id)
                .await
                .map(|_| ()),
            ClientMessage::Authenticate { .. } => Ok(()),
        };

        // Successful sends are acknowledged by the `message_sent` push.
        result
            .err()
            .map(|e| ServerMessage::from(&e).to_frame())
    }

    /// Drop this socket from the registry and the transport.
    pub async fn close(self, state: &AppState) {
        if let Some(removed) = state.registry.unregister(self.handle).await {
            info!(
                user_id = %removed.user_id,
                went_offline = removed.went_offline,
                "Streaming client disconnected"
            );
        }
        state.transport.detach(self.handle).await;
    }
}

/// WebSocket handler for streaming.
///
/// A bearer header already verified by the auth middleware takes precedence
/// over the `i` query parameter.
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    debug!(authenticated = user_id.is_some(), "New streaming connection");

    ws.on_upgrade(move |socket| handle_socket(socket, query, user_id, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(
    socket: WebSocket,
    query: StreamQuery,
    user_id: Option<String>,
    state: AppState,
) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut frames) = mpsc::unbounded_channel::<String>();

    let mut session = StreamSession::new(ConnectionHandle::new());
    state.transport.attach(session.handle(), outbox.clone()).await;

    let greeting = match (user_id, &query.token) {
        (Some(user_id), _) => Some(session.bind(&state, user_id).await),
        (None, Some(token)) => Some(session.authenticate(&state, token).await),
        (None, None) => None,
    };
    if let Some(reply) = greeting {
        let _ = outbox.send(reply.to_frame());
    }

    loop {
        tokio::select! {
            // Handle incoming messages from client
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = session.handle_text(&state, text.as_str()).await {
                            let _ = outbox.send(reply);
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client closed connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            // Replies and live events queued for this socket
            Some(frame) = frames.recv() => {
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    session.close(&state).await;
}
