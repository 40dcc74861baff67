//! Create content table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Content::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Content::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Content::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Content::Kind).string_len(16).not_null())
                    .col(ColumnDef::new(Content::Name).string_len(256))
                    .col(ColumnDef::new(Content::MediaUrl).string_len(1024).not_null())
                    .col(ColumnDef::new(Content::Description).text())
                    .col(
                        ColumnDef::new(Content::LikesCount)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Content::LikesCount).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Content::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Content::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_user")
                            .from(Content::Table, Content::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, created_at) for per-user listings
        manager
            .create_index(
                Index::create()
                    .name("idx_content_user_created_at")
                    .table(Content::Table)
                    .col(Content::UserId)
                    .col(Content::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: (kind, created_at) for global listings
        manager
            .create_index(
                Index::create()
                    .name("idx_content_kind_created_at")
                    .table(Content::Table)
                    .col(Content::Kind)
                    .col(Content::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Content::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Content {
    Table,
    Id,
    UserId,
    Kind,
    Name,
    MediaUrl,
    Description,
    LikesCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
