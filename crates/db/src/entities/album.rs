//! Album entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "album")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owner of the album
    #[sea_orm(indexed)]
    pub user_id: String,

    pub title: String,

    /// Number of `album_like` rows (denormalized)
    #[sea_orm(default_value = 0)]
    pub likes_count: i32,

    /// Number of `saved_album` rows (denormalized)
    #[sea_orm(default_value = 0)]
    pub saves_count: i32,

    #[sea_orm(default_value = 0)]
    pub shares_count: i32,

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
    Owner,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
