//! Direct messaging service.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use showcase_common::{AppError, AppResult, ClockService, IdGenerator};
use showcase_db::{
    entities::{message, notification::NotificationType},
    repositories::{MessageRepository, UserRepository},
};
use validator::Validate;

use super::live::{LiveDelivery, StreamEvent};
use super::notification::{NotificationActor, NotificationService};
use super::profile::{ActorDirectory, ActorView};
use super::validation::not_blank;
use super::{begin, commit};

/// Default lifetime of an auto-deleting message.
pub const DEFAULT_MESSAGE_TTL_HOURS: i64 = 24;

/// Input for sending a message.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessageInput {
    pub recipient_id: String,

    #[validate(length(min = 1, max = 2000), custom(function = "not_blank"))]
    pub content: String,

    /// Delete the message once the configured lifetime has passed.
    #[serde(default)]
    pub auto_delete: bool,
}

/// One row of a user's conversation list.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub partner: ActorView,
    pub last_message: message::Model,
    /// Unread messages from `partner` to the user.
    pub unread_count: u64,
}

/// Messaging service for business logic.
#[derive(Clone)]
pub struct MessagingService {
    db: Arc<DatabaseConnection>,
    message_repo: MessageRepository,
    user_repo: UserRepository,
    actors: ActorDirectory,
    notifications: NotificationService,
    delivery: Option<LiveDelivery>,
    clock: ClockService,
    ttl: Duration,
    id_gen: IdGenerator,
}

impl MessagingService {
    /// Create a new messaging service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        message_repo: MessageRepository,
        user_repo: UserRepository,
        actors: ActorDirectory,
        notifications: NotificationService,
        clock: ClockService,
    ) -> Self {
        Self {
            db,
            message_repo,
            user_repo,
            actors,
            notifications,
            delivery: None,
            clock,
            ttl: Duration::hours(DEFAULT_MESSAGE_TTL_HOURS),
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the live delivery used for message pushes.
    pub fn set_live_delivery(&mut self, delivery: LiveDelivery) {
        self.delivery = Some(delivery);
    }

    /// Override the lifetime of auto-deleting messages.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Send a direct message.
    pub async fn send(&self, sender_id: &str, input: SendMessageInput) -> AppResult<message::Model> {
        input.validate()?;

        if input.recipient_id == sender_id {
            return Err(AppError::Validation(
                "Cannot send a message to yourself".to_string(),
            ));
        }

        let txn = begin(&self.db).await?;

        self.user_repo
            .find_by_id(&txn, &input.recipient_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User: {}", input.recipient_id)))?;

        let now = self.clock.now_fixed();
        let expires_at = input.auto_delete.then(|| now + self.ttl);

        let created = self
            .message_repo
            .create(
                &txn,
                message::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    sender_id: Set(sender_id.to_string()),
                    recipient_id: Set(input.recipient_id.clone()),
                    text: Set(input.content),
                    is_read: Set(false),
                    expires_at: Set(expires_at),
                    created_at: Set(now),
                },
            )
            .await?;

        let notification = self
            .notifications
            .record(
                &txn,
                &created.recipient_id,
                &NotificationActor::user(sender_id),
                NotificationType::NewMessage,
                None,
            )
            .await?;

        commit(txn).await?;

        tracing::debug!(
            message_id = %created.id,
            sender_id = %sender_id,
            recipient_id = %created.recipient_id,
            auto_delete = expires_at.is_some(),
            "Message sent"
        );

        if let Some(ref notification) = notification {
            self.notifications.announce(notification).await;
        }
        if let Some(ref delivery) = self.delivery {
            delivery
                .push(
                    &created.recipient_id,
                    &StreamEvent::NewMessage {
                        message: created.clone(),
                    },
                )
                .await;
            delivery
                .push(
                    sender_id,
                    &StreamEvent::MessageSent {
                        message: created.clone(),
                    },
                )
                .await;
        }

        Ok(created)
    }

    /// Conversation between `user_id` and `other_id`, oldest first.
    ///
    /// Expired messages of the pair are deleted first. Everything `other_id`
    /// sent that was unread is marked read and returned as read.
    pub async fn history(&self, user_id: &str, other_id: &str) -> AppResult<Vec<message::Model>> {
        let now = self.clock.now_fixed();
        let txn = begin(&self.db).await?;

        let swept = self
            .message_repo
            .delete_expired_between(&txn, user_id, other_id, now)
            .await?;
        if swept > 0 {
            tracing::debug!(user_id = %user_id, other_id = %other_id, swept, "Swept expired messages");
        }

        let mut messages = self
            .message_repo
            .find_between(&txn, user_id, other_id, now)
            .await?;

        let unread: Vec<String> = messages
            .iter()
            .filter(|m| m.recipient_id == user_id && !m.is_read)
            .map(|m| m.id.clone())
            .collect();

        if !unread.is_empty() {
            self.message_repo.mark_read_by_ids(&txn, &unread).await?;
            for message in &mut messages {
                if message.recipient_id == user_id {
                    message.is_read = true;
                }
            }
        }

        commit(txn).await?;
        Ok(messages)
    }

    /// Latest live message per counterpart, most recent conversation first.
    pub async fn list_conversations(&self, user_id: &str) -> AppResult<Vec<ConversationSummary>> {
        let now = self.clock.now_fixed();
        let latest = self
            .message_repo
            .find_latest_per_counterpart(user_id, now)
            .await?;
        let unread = self.message_repo.count_unread_by_sender(user_id, now).await?;

        let order: Vec<String> = latest
            .iter()
            .map(|message| message.counterpart_of(user_id).to_string())
            .collect();
        let mut latest: HashMap<String, message::Model> =
            order.iter().cloned().zip(latest).collect();

        let partners = self.actors.load(&order).await?;

        Ok(order
            .into_iter()
            .filter_map(|partner_id| {
                let Some(partner) = partners.get(&partner_id).cloned() else {
                    tracing::warn!(user_id = %user_id, partner_id = %partner_id, "Conversation partner missing");
                    return None;
                };
                let last_message = latest.remove(&partner_id)?;
                Some(ConversationSummary {
                    partner,
                    last_message,
                    unread_count: unread.get(&partner_id).copied().unwrap_or(0),
                })
            })
            .collect())
    }

    /// Number of live unread messages addressed to a user.
    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        self.message_repo
            .count_unread(user_id, self.clock.now_fixed())
            .await
    }
}
