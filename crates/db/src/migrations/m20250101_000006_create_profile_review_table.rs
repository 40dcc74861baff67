//! Create profile review table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProfileReview::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProfileReview::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProfileReview::ReviewerId).string_len(32).not_null())
                    .col(ColumnDef::new(ProfileReview::SubjectId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(ProfileReview::Rating)
                            .small_integer()
                            .not_null()
                            .check(Expr::col(ProfileReview::Rating).between(1, 5)),
                    )
                    .col(ColumnDef::new(ProfileReview::Comment).text().not_null())
                    .col(
                        ColumnDef::new(ProfileReview::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(ProfileReview::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profile_review_reviewer")
                            .from(ProfileReview::Table, ProfileReview::ReviewerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profile_review_subject")
                            .from(ProfileReview::Table, ProfileReview::SubjectId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (reviewer_id, subject_id) - target of ON CONFLICT in add_review
        manager
            .create_index(
                Index::create()
                    .name("idx_profile_review_reviewer_subject")
                    .table(ProfileReview::Table)
                    .col(ProfileReview::ReviewerId)
                    .col(ProfileReview::SubjectId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (subject_id, id) for listing a profile's reviews
        manager
            .create_index(
                Index::create()
                    .name("idx_profile_review_subject_id")
                    .table(ProfileReview::Table)
                    .col(ProfileReview::SubjectId)
                    .col(ProfileReview::Id)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProfileReview::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ProfileReview {
    Table,
    Id,
    ReviewerId,
    SubjectId,
    Rating,
    Comment,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
