//! User entity (accounts).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "staff")]
    Staff,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "restricted")]
    Restricted,
}

impl Role {
    /// Whether this role may moderate other accounts' engagement.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Handle
    #[sea_orm(unique)]
    pub username: String,

    #[sea_orm(unique)]
    pub username_lower: String,

    /// Contact address (stored lowercased)
    #[sea_orm(unique)]
    pub email: String,

    /// 10-digit mobile number
    #[sea_orm(unique, nullable)]
    pub mobile: Option<String>,

    /// Argon2 password hash (owned by the auth collaborator)
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Access token (owned by the auth collaborator)
    #[sea_orm(unique, nullable)]
    #[serde(skip_serializing)]
    pub token: Option<String>,

    pub role: Role,

    #[sea_orm(default_value = false)]
    pub is_verified: bool,

    /// Display name
    pub name: String,

    /// Avatar URL
    #[sea_orm(nullable)]
    pub avatar_url: Option<String>,

    #[sea_orm(nullable)]
    pub state: Option<String>,

    #[sea_orm(nullable)]
    pub job: Option<String>,

    #[sea_orm(nullable)]
    pub district: Option<String>,

    #[sea_orm(nullable)]
    pub office: Option<String>,

    #[sea_orm(nullable)]
    pub office_place: Option<String>,

    /// Followers count (recomputed from the `following` table on every edge write)
    #[sea_orm(default_value = 0)]
    pub followers_count: i32,

    /// Following count (recomputed from the `following` table on every edge write)
    #[sea_orm(default_value = 0)]
    pub following_count: i32,

    /// Soft-delete marker
    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether the account has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::content::Entity")]
    Contents,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::content::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contents.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
