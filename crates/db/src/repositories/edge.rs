//! Edge repository for the binary relation tables.
//!
//! `album_like`, `saved_album`, and `following` all hold one row per
//! `(actor, target)` pair, and the existence of that row is the source of
//! truth. Inserts are conditional so concurrent toggles on the same pair
//! never produce duplicates.

use std::sync::Arc;

use crate::entities::{AlbumLike, Following, SavedAlbum, album_like, following, saved_album};
use chrono::{DateTime, FixedOffset};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, sea_query::OnConflict,
};
use showcase_common::{AppError, AppResult};

use super::is_unique_violation;

/// Which relation table an edge lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// `album_like`: user → album.
    AlbumLike,
    /// `saved_album`: user → album.
    SavedAlbum,
    /// `following`: follower → followee.
    Following,
}

/// Edge repository for database operations.
#[derive(Clone)]
pub struct EdgeRepository {
    db: Arc<DatabaseConnection>,
}

impl EdgeRepository {
    /// Create a new edge repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Delete the edge if present. Returns the number of rows removed (0 or 1).
    pub async fn remove<C: ConnectionTrait>(
        &self,
        conn: &C,
        kind: EdgeKind,
        actor_id: &str,
        target_id: &str,
    ) -> AppResult<u64> {
        let result = match kind {
            EdgeKind::AlbumLike => {
                AlbumLike::delete_many()
                    .filter(album_like::Column::UserId.eq(actor_id))
                    .filter(album_like::Column::AlbumId.eq(target_id))
                    .exec(conn)
                    .await
            }
            EdgeKind::SavedAlbum => {
                SavedAlbum::delete_many()
                    .filter(saved_album::Column::UserId.eq(actor_id))
                    .filter(saved_album::Column::AlbumId.eq(target_id))
                    .exec(conn)
                    .await
            }
            EdgeKind::Following => {
                Following::delete_many()
                    .filter(following::Column::FollowerId.eq(actor_id))
                    .filter(following::Column::FolloweeId.eq(target_id))
                    .exec(conn)
                    .await
            }
        }
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Insert the edge unless it already exists.
    ///
    /// Returns `true` if this call created the row, `false` if another writer
    /// got there first (either the conflict clause skipped the insert or the
    /// store reported a unique violation).
    pub async fn insert_if_absent<C: ConnectionTrait>(
        &self,
        conn: &C,
        kind: EdgeKind,
        actor_id: &str,
        target_id: &str,
        now: DateTime<FixedOffset>,
    ) -> AppResult<bool> {
        let result = match kind {
            EdgeKind::AlbumLike => {
                AlbumLike::insert(album_like::ActiveModel {
                    user_id: Set(actor_id.to_string()),
                    album_id: Set(target_id.to_string()),
                    created_at: Set(now),
                })
                .on_conflict(
                    OnConflict::columns([album_like::Column::UserId, album_like::Column::AlbumId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(conn)
                .await
            }
            EdgeKind::SavedAlbum => {
                SavedAlbum::insert(saved_album::ActiveModel {
                    user_id: Set(actor_id.to_string()),
                    album_id: Set(target_id.to_string()),
                    created_at: Set(now),
                })
                .on_conflict(
                    OnConflict::columns([
                        saved_album::Column::UserId,
                        saved_album::Column::AlbumId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(conn)
                .await
            }
            EdgeKind::Following => {
                Following::insert(following::ActiveModel {
                    follower_id: Set(actor_id.to_string()),
                    followee_id: Set(target_id.to_string()),
                    created_at: Set(now),
                })
                .on_conflict(
                    OnConflict::columns([
                        following::Column::FollowerId,
                        following::Column::FolloweeId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(conn)
                .await
            }
        };

        match result {
            Ok(rows) => Ok(rows > 0),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Check whether the edge exists.
    pub async fn exists(&self, kind: EdgeKind, actor_id: &str, target_id: &str) -> AppResult<bool> {
        let count = match kind {
            EdgeKind::AlbumLike => {
                AlbumLike::find()
                    .filter(album_like::Column::UserId.eq(actor_id))
                    .filter(album_like::Column::AlbumId.eq(target_id))
                    .count(self.db.as_ref())
                    .await
            }
            EdgeKind::SavedAlbum => {
                SavedAlbum::find()
                    .filter(saved_album::Column::UserId.eq(actor_id))
                    .filter(saved_album::Column::AlbumId.eq(target_id))
                    .count(self.db.as_ref())
                    .await
            }
            EdgeKind::Following => {
                Following::find()
                    .filter(following::Column::FollowerId.eq(actor_id))
                    .filter(following::Column::FolloweeId.eq(target_id))
                    .count(self.db.as_ref())
                    .await
            }
        }
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// Count the edges pointing at a target.
    pub async fn count_for_target(&self, kind: EdgeKind, target_id: &str) -> AppResult<u64> {
        match kind {
            EdgeKind::AlbumLike => {
                AlbumLike::find()
                    .filter(album_like::Column::AlbumId.eq(target_id))
                    .count(self.db.as_ref())
                    .await
            }
            EdgeKind::SavedAlbum => {
                SavedAlbum::find()
                    .filter(saved_album::Column::AlbumId.eq(target_id))
                    .count(self.db.as_ref())
                    .await
            }
            EdgeKind::Following => {
                Following::find()
                    .filter(following::Column::FolloweeId.eq(target_id))
                    .count(self.db.as_ref())
                    .await
            }
        }
        .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_remove_reports_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1), exec(0)])
                .into_connection(),
        );

        let repo = EdgeRepository::new(Arc::clone(&db));
        let first = repo
            .remove(db.as_ref(), EdgeKind::AlbumLike, "user1", "album1")
            .await
            .unwrap();
        let second = repo
            .remove(db.as_ref(), EdgeKind::AlbumLike, "user1", "album1")
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn test_insert_if_absent_skipped_by_conflict() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1), exec(0)])
                .into_connection(),
        );

        let repo = EdgeRepository::new(Arc::clone(&db));
        let now = Utc::now().fixed_offset();
        let created = repo
            .insert_if_absent(db.as_ref(), EdgeKind::Following, "user1", "user2", now)
            .await
            .unwrap();
        let raced = repo
            .insert_if_absent(db.as_ref(), EdgeKind::Following, "user1", "user2", now)
            .await
            .unwrap();

        assert!(created);
        assert!(!raced);
    }

    #[tokio::test]
    async fn test_other_errors_surface_as_database() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_errors([DbErr::Custom("connection reset".to_string())])
                .into_connection(),
        );

        let repo = EdgeRepository::new(Arc::clone(&db));
        let result = repo
            .insert_if_absent(
                db.as_ref(),
                EdgeKind::SavedAlbum,
                "user1",
                "album1",
                Utc::now().fixed_offset(),
            )
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
