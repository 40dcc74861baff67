//! Create user table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(User::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(User::Username).string_len(128).not_null())
                    .col(ColumnDef::new(User::UsernameLower).string_len(128).not_null())
                    .col(ColumnDef::new(User::Email).string_len(320).not_null())
                    .col(ColumnDef::new(User::Mobile).string_len(10))
                    .col(ColumnDef::new(User::PasswordHash).string_len(256).not_null())
                    .col(ColumnDef::new(User::Token).string_len(64))
                    .col(
                        ColumnDef::new(User::Role)
                            .string_len(16)
                            .not_null()
                            .default("normal"),
                    )
                    .col(ColumnDef::new(User::IsVerified).boolean().not_null().default(false))
                    .col(ColumnDef::new(User::Name).string_len(256).not_null())
                    .col(ColumnDef::new(User::AvatarUrl).string_len(1024))
                    .col(ColumnDef::new(User::State).string_len(128))
                    .col(ColumnDef::new(User::Job).string_len(128))
                    .col(ColumnDef::new(User::District).string_len(128))
                    .col(ColumnDef::new(User::Office).string_len(256))
                    .col(ColumnDef::new(User::OfficePlace).string_len(256))
                    .col(ColumnDef::new(User::FollowersCount).integer().not_null().default(0))
                    .col(ColumnDef::new(User::FollowingCount).integer().not_null().default(0))
                    .col(ColumnDef::new(User::DeletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(User::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(User::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_user_username_lower", User::UsernameLower),
            ("idx_user_email", User::Email),
            ("idx_user_mobile", User::Mobile),
            ("idx_user_token", User::Token),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(User::Table)
                        .col(column)
                        .unique()
                        .to_owned(),
                )
                .await?;
        }

        // Index: created_at
        manager
            .create_index(
                Index::create()
                    .name("idx_user_created_at")
                    .table(User::Table)
                    .col(User::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum User {
    Table,
    Id,
    Username,
    UsernameLower,
    Email,
    Mobile,
    PasswordHash,
    Token,
    Role,
    IsVerified,
    Name,
    AvatarUrl,
    State,
    Job,
    District,
    Office,
    OfficePlace,
    FollowersCount,
    FollowingCount,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
}
