//! Album repository.
//!
//! Counter columns are only written through [`AlbumRepository::increment_counter`]
//! and [`AlbumRepository::decrement_counter`], inside the transaction that
//! mutates the matching edge table.

use std::sync::Arc;

use crate::entities::{Album, album};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    sea_query::Expr,
};
use showcase_common::{AppError, AppResult};

/// Denormalized album counters kept in step with an edge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumCounter {
    /// `likes_count`, mirrors `album_like`.
    Likes,
    /// `saves_count`, mirrors `saved_album`.
    Saves,
}

impl AlbumCounter {
    const fn column(self) -> album::Column {
        match self {
            Self::Likes => album::Column::LikesCount,
            Self::Saves => album::Column::SavesCount,
        }
    }

    const fn column_name(self) -> &'static str {
        match self {
            Self::Likes => "likes_count",
            Self::Saves => "saves_count",
        }
    }

    /// Read this counter from a model.
    #[must_use]
    pub const fn value(self, model: &album::Model) -> i32 {
        match self {
            Self::Likes => model.likes_count,
            Self::Saves => model.saves_count,
        }
    }
}

/// Album repository for database operations.
#[derive(Clone)]
pub struct AlbumRepository {
    db: Arc<DatabaseConnection>,
}

impl AlbumRepository {
    /// Create a new album repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an album by ID on the given connection or transaction.
    pub async fn find_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<Option<album::Model>> {
        Album::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find several albums at once. Unknown IDs are skipped.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<album::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Album::find()
            .filter(album::Column::Id.is_in(ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new album.
    pub async fn create(&self, model: album::ActiveModel) -> AppResult<album::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Add one to a counter in a single statement.
    pub async fn increment_counter<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        counter: AlbumCounter,
    ) -> AppResult<()> {
        Album::update_many()
            .col_expr(counter.column(), Expr::col(counter.column()).add(1))
            .filter(album::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Subtract one from a counter in a single statement, never going below zero.
    pub async fn decrement_counter<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        counter: AlbumCounter,
    ) -> AppResult<()> {
        let name = counter.column_name();
        Album::update_many()
            .col_expr(
                counter.column(),
                Expr::cust(format!(
                    "CASE WHEN {name} > 0 THEN {name} - 1 ELSE 0 END"
                )),
            )
            .filter(album::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Current value of a counter, or `None` if the album is gone.
    pub async fn read_counter<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        counter: AlbumCounter,
    ) -> AppResult<Option<i32>> {
        Ok(self
            .find_by_id(conn, id)
            .await?
            .map(|album| counter.value(&album)))
    }
}
