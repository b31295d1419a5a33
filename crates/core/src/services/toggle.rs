//! Like, save, and follow toggles.
//!
//! A toggle flips the existence of one edge and keeps the mirrored album
//! counter in step with it. Edge, counter, and notification row change in a
//! single transaction; the wake-up push goes out only after commit.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde::Serialize;
use showcase_common::{AppError, AppResult, ClockService};
use showcase_db::{
    entities::notification::NotificationType,
    repositories::{AlbumCounter, AlbumRepository, EdgeKind, EdgeRepository, UserRepository},
};

use super::counter::CounterStore;
use super::notification::{NotificationActor, NotificationService};
use super::{begin, commit};

/// The relation being toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleKind {
    Like,
    Save,
    Follow,
}

impl ToggleKind {
    const fn edge(self) -> EdgeKind {
        match self {
            Self::Like => EdgeKind::AlbumLike,
            Self::Save => EdgeKind::SavedAlbum,
            Self::Follow => EdgeKind::Following,
        }
    }

    const fn counter(self) -> Option<AlbumCounter> {
        match self {
            Self::Like => Some(AlbumCounter::Likes),
            Self::Save => Some(AlbumCounter::Saves),
            Self::Follow => None,
        }
    }

    const fn notification(self) -> Option<NotificationType> {
        match self {
            Self::Like => Some(NotificationType::NewLike),
            Self::Follow => Some(NotificationType::NewFollower),
            Self::Save => None,
        }
    }
}

/// Whether the edge exists after the toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleState {
    On,
    Off,
}

/// Result of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub state: ToggleState,
    /// Album counter after the toggle; `None` for follows.
    pub count: Option<i32>,
    /// A concurrent toggle created the edge first. Nothing was written.
    pub contended: bool,
}

/// Runs toggles on the binary relations.
#[derive(Clone)]
pub struct ToggleCoordinator {
    db: Arc<DatabaseConnection>,
    edge_repo: EdgeRepository,
    album_repo: AlbumRepository,
    user_repo: UserRepository,
    counters: CounterStore,
    notifications: NotificationService,
    clock: ClockService,
}

impl ToggleCoordinator {
    /// Create a new toggle coordinator.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        edge_repo: EdgeRepository,
        album_repo: AlbumRepository,
        user_repo: UserRepository,
        notifications: NotificationService,
        clock: ClockService,
    ) -> Self {
        Self {
            db,
            edge_repo,
            counters: CounterStore::new(album_repo.clone()),
            album_repo,
            user_repo,
            notifications,
            clock,
        }
    }

    /// Like or unlike an album.
    pub async fn toggle_like(&self, user_id: &str, album_id: &str) -> AppResult<ToggleOutcome> {
        self.toggle(ToggleKind::Like, user_id, album_id).await
    }

    /// Save or unsave an album.
    pub async fn toggle_save(&self, user_id: &str, album_id: &str) -> AppResult<ToggleOutcome> {
        self.toggle(ToggleKind::Save, user_id, album_id).await
    }

    /// Follow or unfollow a user.
    pub async fn toggle_follow(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<ToggleOutcome> {
        self.toggle(ToggleKind::Follow, follower_id, followee_id)
            .await
    }

    /// Flip the `(actor_id, target_id)` edge of `kind`.
    pub async fn toggle(
        &self,
        kind: ToggleKind,
        actor_id: &str,
        target_id: &str,
    ) -> AppResult<ToggleOutcome> {
        if kind == ToggleKind::Follow && actor_id == target_id {
            return Err(AppError::SelfReferenceRejected);
        }

        let txn = begin(&self.db).await?;

        // Whoever gets notified when the edge is created.
        let target_owner = match kind {
            ToggleKind::Like | ToggleKind::Save => self
                .album_repo
                .find_by_id(&txn, target_id)
                .await?
                .map(|album| album.user_id),
            ToggleKind::Follow => self
                .user_repo
                .find_by_id(&txn, target_id)
                .await?
                .map(|user| user.id),
        }
        .ok_or_else(|| AppError::TargetNotFound(target_id.to_string()))?;

        let edge = kind.edge();
        let removed = self
            .edge_repo
            .remove(&txn, edge, actor_id, target_id)
            .await?;

        if removed > 0 {
            let count = match kind.counter() {
                Some(counter) => {
                    self.counters.decrement(&txn, target_id, counter).await?;
                    self.counters.read(&txn, target_id, counter).await?
                }
                None => None,
            };
            commit(txn).await?;

            tracing::debug!(kind = ?kind, actor_id = %actor_id, target_id = %target_id, "Toggled off");
            return Ok(ToggleOutcome {
                state: ToggleState::Off,
                count,
                contended: false,
            });
        }

        let inserted = self
            .edge_repo
            .insert_if_absent(&txn, edge, actor_id, target_id, self.clock.now_fixed())
            .await?;

        if !inserted {
            // Nothing was written. A unique violation may have aborted the
            // transaction, so read the count on the pool instead.
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            let count = match kind.counter() {
                Some(counter) => {
                    self.counters
                        .read(self.db.as_ref(), target_id, counter)
                        .await?
                }
                None => None,
            };

            tracing::info!(
                kind = ?kind,
                actor_id = %actor_id,
                target_id = %target_id,
                "Toggle lost a concurrent insert"
            );
            return Ok(ToggleOutcome {
                state: ToggleState::On,
                count,
                contended: true,
            });
        }

        let count = match kind.counter() {
            Some(counter) => {
                self.counters.increment(&txn, target_id, counter).await?;
                self.counters.read(&txn, target_id, counter).await?
            }
            None => None,
        };

        let notification = match kind.notification() {
            Some(notification_type) => {
                let related = (kind != ToggleKind::Follow).then_some(target_id);
                self.notifications
                    .record(
                        &txn,
                        &target_owner,
                        &NotificationActor::user(actor_id),
                        notification_type,
                        related,
                    )
                    .await?
            }
            None => None,
        };

        commit(txn).await?;

        if let Some(ref notification) = notification {
            self.notifications.announce(notification).await;
        }

        tracing::debug!(kind = ?kind, actor_id = %actor_id, target_id = %target_id, "Toggled on");
        Ok(ToggleOutcome {
            state: ToggleState::On,
            count,
            contended: false,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::profile::ActorDirectory;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use showcase_db::entities::album;
    use showcase_common::SystemClock;
    use showcase_db::repositories::NotificationRepository;

    fn coordinator(db: &Arc<DatabaseConnection>) -> ToggleCoordinator {
        let db = Arc::clone(db);
        let clock: ClockService = Arc::new(SystemClock);
        let notifications = NotificationService::new(
            Arc::clone(&db),
            NotificationRepository::new(Arc::clone(&db)),
            AlbumRepository::new(Arc::clone(&db)),
            ActorDirectory::new(UserRepository::new(Arc::clone(&db))),
            Arc::clone(&clock),
        );
        ToggleCoordinator::new(
            Arc::clone(&db),
            EdgeRepository::new(Arc::clone(&db)),
            AlbumRepository::new(Arc::clone(&db)),
            UserRepository::new(Arc::clone(&db)),
            notifications,
            clock,
        )
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ToggleKind::Like.counter(), Some(AlbumCounter::Likes));
        assert_eq!(ToggleKind::Follow.counter(), None);
        assert_eq!(ToggleKind::Save.notification(), None);
        assert_eq!(
            ToggleKind::Follow.notification(),
            Some(NotificationType::NewFollower)
        );
    }

    #[tokio::test]
    async fn test_self_follow_rejected_before_any_statement() {
        // The mock has nothing queued, so any query would surface as a
        // database error instead of the expected rejection.
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let coordinator = coordinator(&db);

        let result = coordinator.toggle_follow("alice", "alice").await;
        assert!(matches!(result, Err(AppError::SelfReferenceRejected)));
    }

    fn album_with_likes(likes: i32) -> album::Model {
        album::Model {
            id: "album1".to_string(),
            user_id: "owner1".to_string(),
            title: "Harbour".to_string(),
            likes_count: likes,
            saves_count: 0,
            shares_count: 0,
            created_at: Utc::now().into(),
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_lost_insert_race_reports_on_without_writes() {
        // Target lookup, then no edge to remove, then the conditional insert
        // skips because another writer created the edge first.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[album_with_likes(4)]])
                .append_exec_results([exec(0), exec(0)])
                .append_query_results([[album_with_likes(4)]])
                .into_connection(),
        );
        let coordinator = coordinator(&db);

        let outcome = coordinator.toggle_like("fan", "album1").await.unwrap();

        assert_eq!(outcome.state, ToggleState::On);
        assert_eq!(outcome.count, Some(4));
        assert!(outcome.contended);

        drop(coordinator);
        let log = format!("{:?}", Arc::try_unwrap(db).ok().unwrap().into_transaction_log());
        assert!(log.contains(r#"INSERT INTO \"album_like\""#));
        assert!(!log.contains(r#"UPDATE \"album\""#));
        assert!(!log.contains(r#"INSERT INTO \"notification\""#));
    }
}
