//! Create content like table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContentLike::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContentLike::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ContentLike::ContentId).string_len(32).not_null())
                    .col(ColumnDef::new(ContentLike::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(ContentLike::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_like_content")
                            .from(ContentLike::Table, ContentLike::ContentId)
                            .to(Content::Table, Content::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_like_user")
                            .from(ContentLike::Table, ContentLike::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (content_id, user_id) - one like per user per item
        manager
            .create_index(
                Index::create()
                    .name("idx_content_like_content_user")
                    .table(ContentLike::Table)
                    .col(ContentLike::ContentId)
                    .col(ContentLike::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: user_id (for the hard-delete count repair)
        manager
            .create_index(
                Index::create()
                    .name("idx_content_like_user_id")
                    .table(ContentLike::Table)
                    .col(ContentLike::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContentLike::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ContentLike {
    Table,
    Id,
    ContentId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum Content {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
