//! Direct message repository.
//!
//! Every read filters out expired rows, so an expired message is never
//! returned even before a sweep has deleted it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{Message, message};
use chrono::{DateTime, FixedOffset};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use showcase_common::{AppError, AppResult};

/// Messages exchanged between `a` and `b` in either direction.
fn between(a: &str, b: &str) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(message::Column::SenderId.eq(a))
                .add(message::Column::RecipientId.eq(b)),
        )
        .add(
            Condition::all()
                .add(message::Column::SenderId.eq(b))
                .add(message::Column::RecipientId.eq(a)),
        )
}

/// Messages that have not expired at `now`.
fn active_at(now: DateTime<FixedOffset>) -> Condition {
    Condition::any()
        .add(message::Column::ExpiresAt.is_null())
        .add(message::Column::ExpiresAt.gte(now))
}

/// Messages that have expired at `now`.
fn expired_at(now: DateTime<FixedOffset>) -> Condition {
    Condition::all()
        .add(message::Column::ExpiresAt.is_not_null())
        .add(message::Column::ExpiresAt.lt(now))
}

/// Message repository for database operations.
#[derive(Clone)]
pub struct MessageRepository {
    db: Arc<DatabaseConnection>,
}

impl MessageRepository {
    /// Create a new message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new message.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: message::ActiveModel,
    ) -> AppResult<message::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete the expired messages of one conversation.
    pub async fn delete_expired_between<C: ConnectionTrait>(
        &self,
        conn: &C,
        a: &str,
        b: &str,
        now: DateTime<FixedOffset>,
    ) -> AppResult<u64> {
        let result = Message::delete_many()
            .filter(between(a, b))
            .filter(expired_at(now))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Live messages of one conversation, oldest first with ties broken by id.
    pub async fn find_between<C: ConnectionTrait>(
        &self,
        conn: &C,
        a: &str,
        b: &str,
        now: DateTime<FixedOffset>,
    ) -> AppResult<Vec<message::Model>> {
        Message::find()
            .filter(between(a, b))
            .filter(active_at(now))
            .order_by_asc(message::Column::CreatedAt)
            .order_by_asc(message::Column::Id)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Flag the given messages as read in one statement.
    pub async fn mark_read_by_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        ids: &[String],
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Message::update_many()
            .filter(message::Column::Id.is_in(ids.iter().cloned()))
            .col_expr(message::Column::IsRead, true.into())
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// The latest live message of each conversation a user takes part in,
    /// newest conversation first.
    ///
    /// Ids are time-ordered, so the greatest id per counterpart is that
    /// conversation's latest message. Grouping happens in the database and
    /// only one row per counterpart is loaded.
    pub async fn find_latest_per_counterpart(
        &self,
        user_id: &str,
        now: DateTime<FixedOffset>,
    ) -> AppResult<Vec<message::Model>> {
        let sent: Vec<(String, String)> = Message::find()
            .select_only()
            .column(message::Column::RecipientId)
            .column_as(message::Column::Id.max(), "last_id")
            .filter(message::Column::SenderId.eq(user_id))
            .filter(active_at(now))
            .group_by(message::Column::RecipientId)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let received: Vec<(String, String)> = Message::find()
            .select_only()
            .column(message::Column::SenderId)
            .column_as(message::Column::Id.max(), "last_id")
            .filter(message::Column::RecipientId.eq(user_id))
            .filter(active_at(now))
            .group_by(message::Column::SenderId)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut latest: HashMap<String, String> = HashMap::new();
        for (counterpart, last_id) in sent.into_iter().chain(received) {
            match latest.get(&counterpart) {
                Some(current) if *current >= last_id => {}
                _ => {
                    latest.insert(counterpart, last_id);
                }
            }
        }

        if latest.is_empty() {
            return Ok(vec![]);
        }

        Message::find()
            .filter(message::Column::Id.is_in(latest.into_values()))
            .order_by_desc(message::Column::CreatedAt)
            .order_by_desc(message::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Live unread messages addressed to a user, counted per sender.
    pub async fn count_unread_by_sender(
        &self,
        user_id: &str,
        now: DateTime<FixedOffset>,
    ) -> AppResult<HashMap<String, u64>> {
        let counts: Vec<(String, i64)> = Message::find()
            .select_only()
            .column(message::Column::SenderId)
            .column_as(message::Column::Id.count(), "unread")
            .filter(message::Column::RecipientId.eq(user_id))
            .filter(message::Column::IsRead.eq(false))
            .filter(active_at(now))
            .group_by(message::Column::SenderId)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(counts
            .into_iter()
            .map(|(sender_id, unread)| (sender_id, unread.max(0) as u64))
            .collect())
    }

    /// Count live unread messages addressed to a user.
    pub async fn count_unread(&self, user_id: &str, now: DateTime<FixedOffset>) -> AppResult<u64> {
        Message::find()
            .filter(message::Column::RecipientId.eq(user_id))
            .filter(message::Column::IsRead.eq(false))
            .filter(active_at(now))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
