//! Fixtures shared by the service tests.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use rapport_common::{AppResult, StorageBackend, UploadedFile};
use rapport_db::entities::{content, user};
use sea_orm::{MockExecResult, Value};

use crate::services::auth::Actor;

/// Storage that keeps only the keys it was asked to write or remove.
#[derive(Default)]
pub struct RecordingStorage {
    pub uploaded: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl StorageBackend for RecordingStorage {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<UploadedFile> {
        self.uploaded.lock().unwrap().push(key.to_string());
        Ok(UploadedFile {
            key: key.to_string(),
            url: self.public_url(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5: String::new(),
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("/files/{key}")
    }
}

pub fn create_test_user(id: &str) -> user::Model {
    user::Model {
        id: id.to_string(),
        username: id.to_string(),
        username_lower: id.to_lowercase(),
        email: format!("{}@example.com", id.to_lowercase()),
        mobile: None,
        password_hash: "hash".to_string(),
        token: Some(format!("token-{id}")),
        role: user::Role::Normal,
        is_verified: true,
        name: format!("User {id}"),
        avatar_url: None,
        state: None,
        job: None,
        district: None,
        office: None,
        office_place: None,
        followers_count: 0,
        following_count: 0,
        deleted_at: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

pub fn create_test_content(id: &str, owner: &str) -> content::Model {
    content::Model {
        id: id.to_string(),
        user_id: owner.to_string(),
        kind: content::ContentKind::Image,
        name: Some("Backwaters".to_string()),
        media_url: format!("/files/posts/{id}.png"),
        description: None,
        likes_count: 0,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

pub fn actor(id: &str) -> Actor {
    Actor {
        id: id.to_string(),
        role: user::Role::Normal,
    }
}

pub fn admin(id: &str) -> Actor {
    Actor {
        id: id.to_string(),
        role: user::Role::Admin,
    }
}

pub fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
    maplit::btreemap! { "num_items" => Value::BigInt(Some(n)) }
}

pub const fn exec(rows: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected: rows,
    }
}
