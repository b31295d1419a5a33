//! Report repository.

use std::sync::Arc;

use crate::entities::{
    Report,
    report::{self, ReportStatus},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use showcase_common::{AppError, AppResult};

use super::is_unique_violation;

/// Report repository for database operations.
#[derive(Clone)]
pub struct ReportRepository {
    db: Arc<DatabaseConnection>,
}

impl ReportRepository {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the pending report a user filed against an album, if any.
    pub async fn find_pending<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        album_id: &str,
    ) -> AppResult<Option<report::Model>> {
        Report::find()
            .filter(report::Column::UserId.eq(user_id))
            .filter(report::Column::AlbumId.eq(album_id))
            .filter(report::Column::Status.eq(ReportStatus::Pending))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new report.
    ///
    /// A second pending report for the same user and album is rejected by
    /// the store as a [`AppError::Conflict`], even when two are filed at once.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: report::ActiveModel,
    ) -> AppResult<report::Model> {
        model.insert(conn).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("You already have a pending report for this album".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Reports with the given status, oldest first.
    pub async fn find_by_status(&self, status: ReportStatus) -> AppResult<Vec<report::Model>> {
        Report::find()
            .filter(report::Column::Status.eq(status))
            .order_by_asc(report::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_report(id: &str) -> report::Model {
        report::Model {
            id: id.to_string(),
            album_id: "album1".to_string(),
            user_id: "user1".to_string(),
            reason: "spam".to_string(),
            description: None,
            status: ReportStatus::Pending,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_pending() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_report("r1")]])
                .append_query_results([Vec::<report::Model>::new()])
                .into_connection(),
        );

        let repo = ReportRepository::new(Arc::clone(&db));
        let found = repo.find_pending(db.as_ref(), "user1", "album1").await.unwrap();
        let missing = repo.find_pending(db.as_ref(), "user2", "album1").await.unwrap();

        assert_eq!(found.unwrap().id, "r1");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_find_by_status() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![create_test_report("r1"), create_test_report("r2")]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let pending = repo.find_by_status(ReportStatus::Pending).await.unwrap();

        assert_eq!(pending.len(), 2);
    }
}
