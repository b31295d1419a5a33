//! Create `saved_album` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SavedAlbum::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SavedAlbum::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(SavedAlbum::AlbumId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(SavedAlbum::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(SavedAlbum::UserId)
                            .col(SavedAlbum::AlbumId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_saved_album_user")
                            .from(SavedAlbum::Table, SavedAlbum::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_saved_album_album")
                            .from(SavedAlbum::Table, SavedAlbum::AlbumId)
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
                    .name("idx_saved_album_album_id")
                    .table(SavedAlbum::Table)
                    .col(SavedAlbum::AlbumId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SavedAlbum::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SavedAlbum {
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
