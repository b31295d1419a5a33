//! Registry of live real-time connections.
//!
//! Maps a user to the connection handle(s) currently able to receive pushes.
//! The registry is purely in-memory and never touches durable state.

use std::collections::HashMap;
use std::fmt;

use showcase_common::ConnectionPolicy;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque handle identifying one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(Uuid);

impl ConnectionHandle {
    /// Allocate a fresh handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of removing a handle from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregistered {
    /// The user the handle belonged to.
    pub user_id: String,
    /// Whether the user has no live connection left.
    pub went_offline: bool,
}

#[derive(Default)]
struct RegistryState {
    /// Handles per user, oldest first.
    by_user: HashMap<String, Vec<ConnectionHandle>>,
    /// Reverse index so unregistering is O(1) in the number of users.
    by_handle: HashMap<ConnectionHandle, String>,
}

impl RegistryState {
    fn detach(&mut self, handle: ConnectionHandle) -> Option<Unregistered> {
        let user_id = self.by_handle.remove(&handle)?;
        let went_offline = match self.by_user.get_mut(&user_id) {
            Some(handles) => {
                handles.retain(|h| *h != handle);
                handles.is_empty()
            }
            None => true,
        };
        if went_offline {
            self.by_user.remove(&user_id);
        }
        Some(Unregistered {
            user_id,
            went_offline,
        })
    }
}

/// In-memory map from user id to live connection handles.
pub struct ConnectionRegistry {
    policy: ConnectionPolicy,
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    /// Create an empty registry with the given policy.
    #[must_use]
    pub fn new(policy: ConnectionPolicy) -> Self {
        Self {
            policy,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Associate `handle` with `user_id`.
    ///
    /// Under [`ConnectionPolicy::LastWins`] any previous handle of the user is
    /// dropped from the registry. A handle that was registered for another
    /// user moves to this one. Returns `true` if the user was offline before.
    pub async fn register(&self, user_id: &str, handle: ConnectionHandle) -> bool {
        let mut state = self.state.write().await;
        state.detach(handle);

        let came_online = !state.by_user.contains_key(user_id);
        match self.policy {
            ConnectionPolicy::LastWins => {
                if let Some(replaced) = state.by_user.insert(user_id.to_string(), vec![handle]) {
                    for old in replaced {
                        state.by_handle.remove(&old);
                        tracing::debug!(user_id = %user_id, handle = %old, "Connection superseded");
                    }
                }
            }
            ConnectionPolicy::FanOut => {
                state
                    .by_user
                    .entry(user_id.to_string())
                    .or_default()
                    .push(handle);
            }
        }
        state.by_handle.insert(handle, user_id.to_string());

        tracing::debug!(user_id = %user_id, handle = %handle, "Connection registered");
        came_online
    }

    /// Remove `handle` from whichever user it belongs to.
    ///
    /// Unknown handles are ignored, so calling this twice is harmless.
    pub async fn unregister(&self, handle: ConnectionHandle) -> Option<Unregistered> {
        let removed = self.state.write().await.detach(handle);
        if let Some(ref removed) = removed {
            tracing::debug!(
                user_id = %removed.user_id,
                handle = %handle,
                went_offline = removed.went_offline,
                "Connection unregistered"
            );
        }
        removed
    }

    /// Most recently registered handle of a user.
    pub async fn route(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.state
            .read()
            .await
            .by_user
            .get(user_id)
            .and_then(|handles| handles.last().copied())
    }

    /// Every live handle of a user.
    pub async fn connections(&self, user_id: &str) -> Vec<ConnectionHandle> {
        self.state
            .read()
            .await
            .by_user
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the user has at least one live connection.
    pub async fn is_online(&self, user_id: &str) -> bool {
        self.state.read().await.by_user.contains_key(user_id)
    }

    /// Users with at least one live connection.
    pub async fn online_users(&self) -> Vec<String> {
        self.state.read().await.by_user.keys().cloned().collect()
    }

    /// Total number of registered handles.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.by_handle.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(ConnectionPolicy::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_writer_wins() {
        let registry = ConnectionRegistry::new(ConnectionPolicy::LastWins);
        let first = ConnectionHandle::new();
        let second = ConnectionHandle::new();

        assert!(registry.register("alice", first).await);
        assert!(!registry.register("alice", second).await);

        assert_eq!(registry.route("alice").await, Some(second));
        assert_eq!(registry.connections("alice").await, vec![second]);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_stale_handle_close_keeps_newer_connection() {
        let registry = ConnectionRegistry::new(ConnectionPolicy::LastWins);
        let first = ConnectionHandle::new();
        let second = ConnectionHandle::new();
        registry.register("alice", first).await;
        registry.register("alice", second).await;

        // The superseded socket closes after the new one registered.
        assert!(registry.unregister(first).await.is_none());
        assert_eq!(registry.route("alice").await, Some(second));
    }

    #[tokio::test]
    async fn test_fan_out_keeps_every_connection() {
        let registry = ConnectionRegistry::new(ConnectionPolicy::FanOut);
        let phone = ConnectionHandle::new();
        let laptop = ConnectionHandle::new();
        registry.register("alice", phone).await;
        registry.register("alice", laptop).await;

        assert_eq!(registry.connections("alice").await, vec![phone, laptop]);
        assert_eq!(registry.route("alice").await, Some(laptop));

        let removed = registry.unregister(laptop).await.unwrap();
        assert!(!removed.went_offline);
        assert_eq!(registry.route("alice").await, Some(phone));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::default();
        let handle = ConnectionHandle::new();
        registry.register("alice", handle).await;

        let removed = registry.unregister(handle).await.unwrap();
        assert_eq!(removed.user_id, "alice");
        assert!(removed.went_offline);

        assert!(registry.unregister(handle).await.is_none());
        assert!(registry.route("alice").await.is_none());
        assert!(!registry.is_online("alice").await);
    }

    #[tokio::test]
    async fn test_reauthenticating_handle_moves_to_new_user() {
        let registry = ConnectionRegistry::default();
        let handle = ConnectionHandle::new();
        registry.register("alice", handle).await;
        registry.register("bob", handle).await;

        assert!(registry.route("alice").await.is_none());
        assert_eq!(registry.route("bob").await, Some(handle));
        assert_eq!(registry.online_users().await, vec!["bob".to_string()]);
    }
}
