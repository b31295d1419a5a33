//! Notification entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    #[sea_orm(string_value = "new_follower")]
    NewFollower,
    #[sea_orm(string_value = "new_like")]
    NewLike,
    #[sea_orm(string_value = "new_comment")]
    NewComment,
    #[sea_orm(string_value = "new_reply")]
    NewReply,
    #[sea_orm(string_value = "new_message")]
    NewMessage,
    #[sea_orm(string_value = "report_received")]
    ReportReceived,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user receiving the notification
    #[sea_orm(indexed)]
    pub notifiee_id: String,

    /// The user who triggered the notification (NULL for the system actor)
    #[sea_orm(nullable)]
    pub notifier_id: Option<String>,

    /// Notification type
    pub notification_type: NotificationType,

    /// Album, comment, or report the notification points at
    #[sea_orm(nullable)]
    pub related_entity_id: Option<String>,

    /// Has this notification been read?
    #[sea_orm(default_value = false)]
    pub is_read: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::NotifieeId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Notifiee,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::NotifierId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Notifier,
}

impl ActiveModelBehavior for ActiveModel {}
