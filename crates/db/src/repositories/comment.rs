//! Comment repository.

use std::sync::Arc;

use crate::entities::{Comment, comment};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use showcase_common::{AppError, AppResult};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID.
    pub async fn find_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new comment.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: comment::ActiveModel,
    ) -> AppResult<comment::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All comments of an album, oldest first.
    pub async fn find_by_album<C: ConnectionTrait>(
        &self,
        conn: &C,
        album_id: &str,
    ) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::AlbumId.eq(album_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All comments of an album on the pool connection.
    pub async fn list_for_album(&self, album_id: &str) -> AppResult<Vec<comment::Model>> {
        self.find_by_album(self.db.as_ref(), album_id).await
    }

    /// Delete the given comments in one statement.
    pub async fn delete_by_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        ids: &[String],
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Comment::delete_many()
            .filter(comment::Column::Id.is_in(ids.iter().cloned()))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_comment(id: &str, parent_id: Option<&str>) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            album_id: "album1".to_string(),
            user_id: "user1".to_string(),
            parent_id: parent_id.map(ToString::to_string),
            text: "Nice shot".to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_list_for_album() {
        let comments = vec![
            create_test_comment("c1", None),
            create_test_comment("c2", Some("c1")),
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([comments])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let result = repo.list_for_album("album1").await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[1].parent_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_delete_by_ids() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                }])
                .into_connection(),
        );

        let repo = CommentRepository::new(Arc::clone(&db));
        let ids = vec!["c1".to_string(), "c2".to_string(), "c3".to_string()];
        let deleted = repo.delete_by_ids(db.as_ref(), &ids).await.unwrap();

        assert_eq!(deleted, 3);
        assert_eq!(repo.delete_by_ids(db.as_ref(), &[]).await.unwrap(), 0);
    }
}
