//! Notification service.
//!
//! Notifications are written in two halves: [`NotificationService::record`]
//! inserts the durable row on the caller's transaction, and
//! [`NotificationService::announce`] pushes the wake-up once that
//! transaction has committed. [`NotificationService::notify`] does both for
//! callers without a transaction of their own.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use sea_orm::{ConnectionTrait, DatabaseConnection, Set};
use serde::Serialize;
use showcase_common::{AppResult, ClockService, IdGenerator};
use showcase_db::{
    entities::notification::{self, NotificationType},
    repositories::{AlbumRepository, NotificationRepository},
};

use super::live::{LiveDelivery, StreamEvent};
use super::profile::{ActorDirectory, ActorView};

/// Default and maximum page size for [`NotificationService::list_recent`].
pub const DEFAULT_NOTIFICATION_LIMIT: u64 = 20;
const MAX_NOTIFICATION_LIMIT: u64 = 100;

/// Who caused a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationActor {
    /// A regular user.
    User(String),
    /// The service itself; stored as a NULL notifier.
    System,
}

impl NotificationActor {
    /// Shorthand for [`NotificationActor::User`].
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(id) => Some(id),
            Self::System => None,
        }
    }
}

/// Human-readable text and deep link for one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    pub message: String,
    pub link: Option<String>,
}

/// Render the message and link of a notification.
///
/// `album_title` is only consulted for album-related kinds; a missing album
/// renders as an empty title.
#[must_use]
pub fn render_notification(
    kind: NotificationType,
    actor: Option<&ActorView>,
    album_title: Option<&str>,
    related_entity_id: Option<&str>,
) -> RenderedNotification {
    let name = actor.map_or("Someone", |a| a.username.as_str());
    let album = album_title.unwrap_or_default();
    let album_link = related_entity_id.map(|id| format!("/album.html?id={id}"));

    match kind {
        NotificationType::NewFollower => RenderedNotification {
            message: format!("{name} started following you"),
            link: actor.map(|a| format!("/profile.html?user={}", a.username)),
        },
        NotificationType::NewLike => RenderedNotification {
            message: format!("{name} liked your album {album}"),
            link: album_link,
        },
        NotificationType::NewComment => RenderedNotification {
            message: format!("{name} commented on your album {album}"),
            link: album_link,
        },
        NotificationType::NewReply => RenderedNotification {
            message: format!("{name} replied to your comment on {album}"),
            link: album_link,
        },
        NotificationType::NewMessage => RenderedNotification {
            message: format!("{name} sent you a message"),
            link: actor.map(|a| format!("/chat.html?user={}", a.id)),
        },
        NotificationType::ReportReceived => RenderedNotification {
            message: "We received your report".to_string(),
            link: None,
        },
    }
}

const fn mentions_album(kind: NotificationType) -> bool {
    matches!(
        kind,
        NotificationType::NewLike | NotificationType::NewComment | NotificationType::NewReply
    )
}

/// A notification enriched for display.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// `None` for notifications from the system actor.
    pub actor: Option<ActorView>,
    pub related_entity_id: Option<String>,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<FixedOffset>,
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DatabaseConnection>,
    notification_repo: NotificationRepository,
    album_repo: AlbumRepository,
    actors: ActorDirectory,
    delivery: Option<LiveDelivery>,
    clock: ClockService,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        notification_repo: NotificationRepository,
        album_repo: AlbumRepository,
        actors: ActorDirectory,
        clock: ClockService,
    ) -> Self {
        Self {
            db,
            notification_repo,
            album_repo,
            actors,
            delivery: None,
            clock,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the live delivery used for wake-up pushes.
    pub fn set_live_delivery(&mut self, delivery: LiveDelivery) {
        self.delivery = Some(delivery);
    }

    /// Insert an unread notification on `conn`.
    ///
    /// Returns `None` without touching the store when the actor is the
    /// recipient.
    pub async fn record<C: ConnectionTrait>(
        &self,
        conn: &C,
        recipient_id: &str,
        actor: &NotificationActor,
        kind: NotificationType,
        related_entity_id: Option<&str>,
    ) -> AppResult<Option<notification::Model>> {
        if actor.user_id() == Some(recipient_id) {
            tracing::debug!(user_id = %recipient_id, kind = ?kind, "Skipping self notification");
            return Ok(None);
        }

        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            notifiee_id: Set(recipient_id.to_string()),
            notifier_id: Set(actor.user_id().map(ToString::to_string)),
            notification_type: Set(kind),
            related_entity_id: Set(related_entity_id.map(ToString::to_string)),
            is_read: Set(false),
            created_at: Set(self.clock.now_fixed()),
        };

        let created = self.notification_repo.create(conn, model).await?;
        Ok(Some(created))
    }

    /// Push the payload-less wake-up for a committed notification.
    pub async fn announce(&self, notification: &notification::Model) {
        if let Some(ref delivery) = self.delivery {
            delivery
                .push(&notification.notifiee_id, &StreamEvent::Notification)
                .await;
        }
    }

    /// Record a notification and push the wake-up.
    pub async fn notify(
        &self,
        recipient_id: &str,
        actor: &NotificationActor,
        kind: NotificationType,
        related_entity_id: Option<&str>,
    ) -> AppResult<Option<notification::Model>> {
        let created = self
            .record(
                self.db.as_ref(),
                recipient_id,
                actor,
                kind,
                related_entity_id,
            )
            .await?;

        if let Some(ref notification) = created {
            self.announce(notification).await;
        }
        Ok(created)
    }

    /// Most recent notifications of a user, newest first, ready for display.
    pub async fn list_recent(&self, user_id: &str, limit: u64) -> AppResult<Vec<NotificationView>> {
        let limit = limit.clamp(1, MAX_NOTIFICATION_LIMIT);
        let rows = self.notification_repo.find_by_user(user_id, limit).await?;

        let actor_ids: Vec<String> = rows.iter().filter_map(|n| n.notifier_id.clone()).collect();
        let actors = self.actors.load(&actor_ids).await?;

        let album_ids: Vec<String> = rows
            .iter()
            .filter(|n| mentions_album(n.notification_type))
            .filter_map(|n| n.related_entity_id.clone())
            .collect();
        let album_titles: HashMap<String, String> = self
            .album_repo
            .find_by_ids(&album_ids)
            .await?
            .into_iter()
            .map(|album| (album.id, album.title))
            .collect();

        Ok(rows
            .into_iter()
            .map(|n| {
                let actor = n
                    .notifier_id
                    .as_ref()
                    .and_then(|id| actors.get(id))
                    .cloned();
                let album_title = n
                    .related_entity_id
                    .as_ref()
                    .and_then(|id| album_titles.get(id))
                    .map(String::as_str);
                let rendered = render_notification(
                    n.notification_type,
                    actor.as_ref(),
                    album_title,
                    n.related_entity_id.as_deref(),
                );

                NotificationView {
                    id: n.id,
                    kind: n.notification_type,
                    actor,
                    related_entity_id: n.related_entity_id,
                    message: rendered.message,
                    link: rendered.link,
                    is_read: n.is_read,
                    created_at: n.created_at,
                }
            })
            .collect())
    }

    /// Mark every notification of a user as read in one statement.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        let updated = self.notification_repo.mark_all_as_read(user_id).await?;
        tracing::debug!(user_id = %user_id, updated, "Marked notifications as read");
        Ok(updated)
    }

    /// Number of unread notifications of a user.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use showcase_common::SystemClock;
    use showcase_db::repositories::UserRepository;

    fn actor(id: &str, username: &str) -> ActorView {
        ActorView {
            id: id.to_string(),
            username: username.to_string(),
            avatar_url: None,
        }
    }

    fn service(db: DatabaseConnection) -> NotificationService {
        let db = Arc::new(db);
        NotificationService::new(
            Arc::clone(&db),
            NotificationRepository::new(Arc::clone(&db)),
            AlbumRepository::new(Arc::clone(&db)),
            ActorDirectory::new(UserRepository::new(Arc::clone(&db))),
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn test_render_every_kind() {
        let alice = actor("u1", "alice");
        let cases = [
            (
                NotificationType::NewFollower,
                "alice started following you",
                Some("/profile.html?user=alice"),
            ),
            (
                NotificationType::NewLike,
                "alice liked your album Harbour",
                Some("/album.html?id=a1"),
            ),
            (
                NotificationType::NewComment,
                "alice commented on your album Harbour",
                Some("/album.html?id=a1"),
            ),
            (
                NotificationType::NewReply,
                "alice replied to your comment on Harbour",
                Some("/album.html?id=a1"),
            ),
            (
                NotificationType::NewMessage,
                "alice sent you a message",
                Some("/chat.html?user=u1"),
            ),
        ];

        for (kind, message, link) in cases {
            let rendered = render_notification(kind, Some(&alice), Some("Harbour"), Some("a1"));
            assert_eq!(rendered.message, message);
            assert_eq!(rendered.link.as_deref(), link);
        }
    }

    #[test]
    fn test_render_system_report_has_no_link() {
        let rendered =
            render_notification(NotificationType::ReportReceived, None, None, Some("a1"));
        assert_eq!(rendered.message, "We received your report");
        assert!(rendered.link.is_none());
    }

    #[test]
    fn test_render_missing_album_title() {
        let rendered = render_notification(
            NotificationType::NewLike,
            Some(&actor("u1", "alice")),
            None,
            Some("gone"),
        );
        assert_eq!(rendered.message, "alice liked your album ");
    }

    #[tokio::test]
    async fn test_self_notification_is_noop() {
        // No results appended: any statement would fail the mock.
        let service = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let created = service
            .notify(
                "alice",
                &NotificationActor::user("alice"),
                NotificationType::NewLike,
                Some("album1"),
            )
            .await
            .unwrap();

        assert!(created.is_none());
    }
}
