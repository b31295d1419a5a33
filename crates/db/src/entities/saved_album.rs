//! Saved album entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Saved album - a bookmark of an album by a user.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "saved_album")]
pub struct Model {
    /// User who saved the album.
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    /// Album that was saved.
    #[sea_orm(primary_key, auto_increment = false)]
    pub album_id: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::album::Entity",
        from = "Column::AlbumId",
        to = "super::album::Column::Id",
        on_delete = "Cascade"
    )]
    Album,
}

impl Related<super::album::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Album.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
