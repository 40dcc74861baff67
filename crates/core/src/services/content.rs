//! Content service: image and video posts.

use std::sync::Arc;

use rapport_common::{
    AppError, AppResult, IdGenerator, MediaKind, StorageBackend, generate_storage_key,
    validate_upload,
};
use rapport_db::{
    entities::content::{self, ContentKind},
    repositories::{ContentQuery, ContentRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::services::auth::Actor;
use crate::services::view::MAX_PAGE_LIMIT;

/// Default page size of image listings.
pub const DEFAULT_IMAGE_PAGE: u64 = 7;

/// Default page size of video listings.
pub const DEFAULT_VIDEO_PAGE: u64 = 5;

/// Metadata of a new post.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateContentInput {
    pub kind: ContentKind,

    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// Editable fields of a post.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateContentInput {
    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// Raw media payload of a new post.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Content service for business logic.
#[derive(Clone)]
pub struct ContentService {
    content_repo: ContentRepository,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
}

impl ContentService {
    /// Create a new content service.
    #[must_use]
    pub fn new(content_repo: ContentRepository, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            content_repo,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Store the media and create the post that references it.
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateContentInput,
        media: MediaUpload,
    ) -> AppResult<content::Model> {
        input.validate()?;
        if input.kind == ContentKind::Image && input.name.is_none() {
            return Err(AppError::Validation("Image posts need a name".to_string()));
        }

        let kind = media_kind(input.kind);
        validate_upload(
            kind,
            &media.file_name,
            &media.content_type,
            media.data.len() as u64,
        )?;

        let key = generate_storage_key(kind, &actor.id, &media.file_name);
        let stored = self
            .storage
            .upload(&key, &media.data, &media.content_type)
            .await?;

        let model = content::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(actor.id.clone()),
            kind: Set(input.kind),
            name: Set(input.name),
            media_url: Set(stored.url),
            description: Set(input.description),
            likes_count: Set(0),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        match self.content_repo.create(model).await {
            Ok(created) => {
                info!(
                    content_id = %created.id,
                    user_id = %actor.id,
                    kind = ?created.kind,
                    "Created content"
                );
                Ok(created)
            }
            Err(err) => {
                if let Err(e) = self.storage.delete(&stored.key).await {
                    warn!(storage_key = %stored.key, error = %e, "Failed to remove orphaned media");
                }
                Err(err)
            }
        }
    }

    /// Get a post by ID.
    pub async fn get(&self, id: &str) -> AppResult<content::Model> {
        self.content_repo.get_by_id(id).await
    }

    /// Newest posts first.
    pub async fn list(
        &self,
        kind: Option<ContentKind>,
        user_id: Option<String>,
        limit: Option<u64>,
        offset: u64,
    ) -> AppResult<Vec<content::Model>> {
        let default_limit = match kind {
            Some(ContentKind::Image) => DEFAULT_IMAGE_PAGE,
            Some(ContentKind::Video) => DEFAULT_VIDEO_PAGE,
            None => DEFAULT_IMAGE_PAGE,
        };

        self.content_repo
            .find_recent(&ContentQuery {
                kind,
                user_id,
                limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_LIMIT),
                offset,
            })
            .await
    }

    /// Edit a post's name or description as its owner or an administrator.
    pub async fn update(
        &self,
        id: &str,
        actor: &Actor,
        input: UpdateContentInput,
    ) -> AppResult<content::Model> {
        input.validate()?;

        let existing = self.content_repo.get_by_id(id).await?;
        if !actor.can_moderate(&existing.user_id) {
            return Err(AppError::Forbidden(
                "Only the owner or an administrator can edit this post".to_string(),
            ));
        }

        let mut active: content::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(Some(name));
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.content_repo.update(active).await
    }

    /// Delete a post, its likes and comments, and its media.
    pub async fn delete(&self, id: &str, actor: &Actor) -> AppResult<()> {
        let existing = self.content_repo.get_by_id(id).await?;
        if !actor.can_moderate(&existing.user_id) {
            return Err(AppError::Forbidden(
                "Only the owner or an administrator can delete this post".to_string(),
            ));
        }

        self.content_repo.delete(id).await?;

        // Media not served by our backend is left alone
        if let Some(key) = self.storage.key_of(&existing.media_url) {
            if let Err(e) = self.storage.delete(&key).await {
                warn!(content_id = %id, storage_key = %key, error = %e, "Failed to delete media");
            }
        }

        info!(content_id = %id, user_id = %actor.id, "Deleted content");
        Ok(())
    }
}

const fn media_kind(kind: ContentKind) -> MediaKind {
    match kind {
        ContentKind::Image => MediaKind::Image,
        ContentKind::Video => MediaKind::Video,
    }
}
