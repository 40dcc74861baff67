//! Account service: registration, sign-in, profile and deletion.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rapport_common::{
    AdminSettings, AppError, AppResult, IdGenerator, MediaKind, StorageBackend,
    generate_avatar_key, validate_upload,
};
use rapport_db::{
    entities::user::{self, Role},
    repositories::{HardDeleteReport, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::services::auth::Actor;
use crate::services::content::MediaUpload;
use crate::services::view::AccountSummary;

/// Input for creating a new account.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 64))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    /// 10-digit mobile number
    #[validate(length(equal = 10))]
    pub mobile: Option<String>,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(min = 1, max = 256))]
    pub name: String,

    #[validate(length(max = 128))]
    pub state: Option<String>,

    #[validate(length(max = 128))]
    pub job: Option<String>,

    #[validate(length(max = 128))]
    pub district: Option<String>,

    #[validate(length(max = 128))]
    pub office: Option<String>,

    #[validate(length(max = 256))]
    pub office_place: Option<String>,
}

/// Credentials for signing in by handle or email.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignInInput {
    #[validate(length(min = 1, max = 256))]
    pub login: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Input for updating the caller's profile.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,

    #[validate(length(max = 2048))]
    pub avatar_url: Option<String>,

    #[validate(length(max = 128))]
    pub state: Option<String>,

    #[validate(length(max = 128))]
    pub job: Option<String>,

    #[validate(length(max = 128))]
    pub district: Option<String>,

    #[validate(length(max = 128))]
    pub office: Option<String>,

    #[validate(length(max = 256))]
    pub office_place: Option<String>,
}

/// A freshly created account and the token it signs in with.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredAccount {
    pub user: user::Model,
    pub token: String,
}

/// Account service for business logic.
#[derive(Clone)]
pub struct AccountService {
    user_repo: UserRepository,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub fn new(user_repo: UserRepository, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            user_repo,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a new account.
    pub async fn register(&self, input: RegisterInput) -> AppResult<RegisteredAccount> {
        input.validate()?;
        if let Some(mobile) = &input.mobile {
            if !mobile.chars().all(|c| c.is_ascii_digit()) {
                return Err(AppError::Validation(
                    "Mobile number must be 10 digits".to_string(),
                ));
            }
        }

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest("Username already taken".to_string()));
        }
        if self.user_repo.find_by_email(&input.email).await?.is_some() {
            return Err(AppError::BadRequest("Email already registered".to_string()));
        }
        if let Some(mobile) = &input.mobile {
            if self.user_repo.find_by_mobile(mobile).await?.is_some() {
                return Err(AppError::BadRequest(
                    "Mobile number already registered".to_string(),
                ));
            }
        }

        let token = self.id_gen.generate_token();
        let model = self.new_account(input, Role::Normal, Some(token.clone()))?;

        // A concurrent sign-up can still win the unique indexes after the checks above
        let user = match self.user_repo.create(model).await {
            Err(AppError::Duplicate(_)) => {
                return Err(AppError::BadRequest(
                    "Username, email or mobile number already registered".to_string(),
                ));
            }
            other => other?,
        };
        info!(user_id = %user.id, username = %user.username, "Registered account");

        Ok(RegisteredAccount { user, token })
    }

    /// Create the configured administrator unless an account already holds its email.
    ///
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, settings: &AdminSettings) -> AppResult<bool> {
        let input = RegisterInput {
            username: settings.username.clone(),
            email: settings.email.clone(),
            mobile: None,
            password: settings.password.clone(),
            name: settings.name.clone(),
            state: None,
            job: None,
            district: None,
            office: None,
            office_place: None,
        };
        input
            .validate()
            .map_err(|e| AppError::Config(format!("Invalid admin settings: {e}")))?;

        if let Some(existing) = self.user_repo.find_by_email(&input.email).await? {
            if existing.role.is_admin() {
                debug!(user_id = %existing.id, "Admin account already exists");
            } else {
                warn!(
                    user_id = %existing.id,
                    "Admin email belongs to a non-admin account, leaving it unchanged"
                );
            }
            return Ok(false);
        }
        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Config(format!(
                "Admin username already taken: {}",
                input.username
            )));
        }

        let model = self.new_account(input, Role::Admin, None)?;
        let user = match self.user_repo.create(model).await {
            // Another instance created it first
            Err(AppError::Duplicate(_)) => return Ok(false),
            other => other?,
        };
        info!(user_id = %user.id, username = %user.username, "Created admin account");
        Ok(true)
    }

    fn new_account(
        &self,
        input: RegisterInput,
        role: Role,
        token: Option<String>,
    ) -> AppResult<user::ActiveModel> {
        let password_hash = hash_password(&input.password)?;

        Ok(user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username.clone()),
            username_lower: Set(input.username.to_lowercase()),
            email: Set(input.email.to_lowercase()),
            mobile: Set(input.mobile),
            password_hash: Set(password_hash),
            token: Set(token),
            is_verified: Set(role.is_admin()),
            role: Set(role),
            name: Set(input.name),
            avatar_url: Set(None),
            state: Set(input.state),
            job: Set(input.job),
            district: Set(input.district),
            office: Set(input.office),
            office_place: Set(input.office_place),
            followers_count: Set(0),
            following_count: Set(0),
            deleted_at: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        })
    }

    /// Check credentials and issue a fresh token.
    pub async fn sign_in(&self, input: SignInInput) -> AppResult<String> {
        input.validate()?;

        let found = if input.login.contains('@') {
            self.user_repo.find_by_email(&input.login).await?
        } else {
            self.user_repo.find_by_username(&input.login).await?
        };
        let user = match found {
            Some(u) if !u.is_deleted() => u,
            _ => return Err(AppError::Unauthenticated),
        };

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(AppError::Unauthenticated);
        }

        let token = self.id_gen.generate_token();
        let user_id = user.id.clone();
        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(token.clone()));
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.user_repo.update(active).await?;

        info!(user_id = %user_id, "Signed in");
        Ok(token)
    }

    /// A live account's full record.
    pub async fn profile(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_active_by_id(id).await
    }

    /// Update the caller's profile.
    pub async fn update_profile(
        &self,
        actor: &Actor,
        input: UpdateProfileInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_active_by_id(&actor.id).await?;
        let mut active: user::ActiveModel = user.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(avatar_url) = input.avatar_url {
            active.avatar_url = Set(Some(avatar_url));
        }
        if let Some(state) = input.state {
            active.state = Set(Some(state));
        }
        if let Some(job) = input.job {
            active.job = Set(Some(job));
        }
        if let Some(district) = input.district {
            active.district = Set(Some(district));
        }
        if let Some(office) = input.office {
            active.office = Set(Some(office));
        }
        if let Some(office_place) = input.office_place {
            active.office_place = Set(Some(office_place));
        }
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.user_repo.update(active).await
    }

    /// Store a new profile photo and point the caller's profile at it.
    ///
    /// The previous photo is removed when this backend stored it.
    pub async fn upload_avatar(&self, actor: &Actor, media: MediaUpload) -> AppResult<user::Model> {
        validate_upload(
            MediaKind::Image,
            &media.file_name,
            &media.content_type,
            media.data.len() as u64,
        )?;

        let user = self.user_repo.get_active_by_id(&actor.id).await?;
        let previous = user.avatar_url.clone();

        let key = generate_avatar_key(&actor.id, &media.file_name);
        let stored = self
            .storage
            .upload(&key, &media.data, &media.content_type)
            .await?;

        let mut active: user::ActiveModel = user.into();
        active.avatar_url = Set(Some(stored.url));
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        let updated = match self.user_repo.update(active).await {
            Ok(updated) => updated,
            Err(err) => {
                if let Err(e) = self.storage.delete(&stored.key).await {
                    warn!(storage_key = %stored.key, error = %e, "Failed to remove orphaned photo");
                }
                return Err(err);
            }
        };

        if let Some(url) = previous {
            self.remove_stored(&url).await;
        }
        info!(user_id = %actor.id, "Updated profile photo");
        Ok(updated)
    }

    /// Clear the caller's profile photo.
    pub async fn delete_avatar(&self, actor: &Actor) -> AppResult<user::Model> {
        let user = self.user_repo.get_active_by_id(&actor.id).await?;
        let Some(previous) = user.avatar_url.clone() else {
            return Ok(user);
        };

        let mut active: user::ActiveModel = user.into();
        active.avatar_url = Set(None);
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        let updated = self.user_repo.update(active).await?;

        self.remove_stored(&previous).await;
        info!(user_id = %actor.id, "Removed profile photo");
        Ok(updated)
    }

    async fn remove_stored(&self, url: &str) {
        if let Some(key) = self.storage.key_of(url) {
            if let Err(e) = self.storage.delete(&key).await {
                warn!(storage_key = %key, error = %e, "Failed to delete profile photo");
            }
        }
    }

    /// Soft-delete the caller's account once `password` checks out.
    pub async fn deactivate(&self, actor: &Actor, password: &str) -> AppResult<()> {
        let user = self.user_repo.get_active_by_id(&actor.id).await?;
        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Forbidden("Invalid password".to_string()));
        }

        self.user_repo.soft_delete(&actor.id).await?;
        info!(user_id = %actor.id, "Soft-deleted account");
        Ok(())
    }

    /// Remove an account and everything it owns. Administrators only.
    pub async fn purge(&self, actor: &Actor, user_id: &str) -> AppResult<HardDeleteReport> {
        if !actor.role.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators can purge accounts".to_string(),
            ));
        }

        let report = self.user_repo.hard_delete(user_id).await?;
        info!(
            user_id = %user_id,
            by = %actor.id,
            neighbours = report.neighbours_repaired,
            contents = report.contents_repaired,
            "Purged account"
        );
        Ok(report)
    }

    /// Search live accounts by handle, display name, job or location.
    pub async fn search(
        &self,
        query: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<AccountSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }

        Ok(self
            .user_repo
            .search(query, limit, offset)
            .await?
            .iter()
            .map(AccountSummary::from)
            .collect())
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
