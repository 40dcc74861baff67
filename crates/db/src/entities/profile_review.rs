//! Profile review entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profile_review")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Who wrote the review
    pub reviewer_id: String,

    /// Profile being reviewed
    #[sea_orm(indexed)]
    pub subject_id: String,

    /// 1..=5
    pub rating: i16,

    #[sea_orm(column_type = "Text")]
    pub comment: String,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ReviewerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Reviewer,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SubjectId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Subject,
}

impl ActiveModelBehavior for ActiveModel {}
