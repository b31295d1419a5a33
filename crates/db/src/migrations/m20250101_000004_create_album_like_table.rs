//! Create `album_like` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AlbumLike::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AlbumLike::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(AlbumLike::AlbumId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(AlbumLike::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(AlbumLike::UserId)
                            .col(AlbumLike::AlbumId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_album_like_user")
                            .from(AlbumLike::Table, AlbumLike::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_album_like_album")
                            .from(AlbumLike::Table, AlbumLike::AlbumId)
                            .to(Album::Table, Album::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: album_id for counting edges per album
        manager
            .create_index(
                Index::create()
                    .name("idx_album_like_album_id")
                    .table(AlbumLike::Table)
                    .col(AlbumLike::AlbumId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AlbumLike::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AlbumLike {
    Table,
    UserId,
    AlbumId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Album {
    Table,
    Id,
}
