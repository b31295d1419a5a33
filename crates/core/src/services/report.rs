//! Album report service.

use std::sync::Arc;

use sea_orm::{DatabaseConnection, Set};
use serde::Deserialize;
use showcase_common::{AppError, AppResult, ClockService, IdGenerator};
use showcase_db::{
    entities::{
        notification::NotificationType,
        report::{self, ReportStatus},
    },
    repositories::{AlbumRepository, ReportRepository},
};
use validator::Validate;

use super::notification::{NotificationActor, NotificationService};
use super::validation::not_blank;
use super::{begin, commit};

/// Input for reporting an album.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FileReportInput {
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub reason: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// Report service for business logic.
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
    report_repo: ReportRepository,
    album_repo: AlbumRepository,
    notifications: NotificationService,
    clock: ClockService,
    id_gen: IdGenerator,
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        report_repo: ReportRepository,
        album_repo: AlbumRepository,
        notifications: NotificationService,
        clock: ClockService,
    ) -> Self {
        Self {
            db,
            report_repo,
            album_repo,
            notifications,
            clock,
            id_gen: IdGenerator::new(),
        }
    }

    /// File a report against an album.
    ///
    /// The reporter gets a `report_received` notification from the system.
    pub async fn file(
        &self,
        album_id: &str,
        reporter_id: &str,
        input: FileReportInput,
    ) -> AppResult<report::Model> {
        input.validate()?;

        let txn = begin(&self.db).await?;

        self.album_repo
            .find_by_id(&txn, album_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Album: {album_id}")))?;

        if self
            .report_repo
            .find_pending(&txn, reporter_id, album_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "You already have a pending report for this album".to_string(),
            ));
        }

        let created = self
            .report_repo
            .create(
                &txn,
                report::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    album_id: Set(album_id.to_string()),
                    user_id: Set(reporter_id.to_string()),
                    reason: Set(input.reason.trim().to_string()),
                    description: Set(input.description.filter(|d| !d.trim().is_empty())),
                    status: Set(ReportStatus::Pending),
                    created_at: Set(self.clock.now_fixed()),
                },
            )
            .await?;

        let notification = self
            .notifications
            .record(
                &txn,
                reporter_id,
                &NotificationActor::System,
                NotificationType::ReportReceived,
                Some(album_id),
            )
            .await?;

        commit(txn).await?;

        if let Some(ref notification) = notification {
            self.notifications.announce(notification).await;
        }

        tracing::info!(report_id = %created.id, album_id = %album_id, reporter_id = %reporter_id, "Album reported");
        Ok(created)
    }

    /// Reports waiting for moderation, oldest first.
    pub async fn pending(&self) -> AppResult<Vec<report::Model>> {
        self.report_repo.find_by_status(ReportStatus::Pending).await
    }
}
