//! Test utilities for database operations.
//!
//! Provides helpers for setting up a migrated scratch database and seeding
//! accounts and content for integration tests.

use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Set,
    Statement,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::entities::{content, user};
use crate::migrations::Migrator;

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "rapport_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "rapport_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "rapport_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// URL of the maintenance database, used to create and drop scratch databases.
    #[must_use]
    pub fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/postgres",
            self.username, self.password, self.host, self.port
        )
    }
}

/// A migrated scratch database owned by one test.
pub struct TestDatabase {
    /// Database connection.
    pub conn: DatabaseConnection,
    /// Database configuration.
    pub config: TestDbConfig,
}

impl TestDatabase {
    /// Connect to the configured test database and run migrations.
    pub async fn new() -> Result<Self, DbErr> {
        Self::with_config(TestDbConfig::default()).await
    }

    /// Connect with a custom configuration and run migrations.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Connected to test database");

        Ok(Self { conn, config })
    }

    /// Create and migrate a database with a random name, so tests can run in parallel.
    pub async fn create_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let unique_suffix = uuid::Uuid::new_v4().simple().to_string();
        config.database = format!("rapport_test_{}", &unique_suffix[..8]);

        let postgres_conn = Database::connect(&config.postgres_url()).await?;
        postgres_conn
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("CREATE DATABASE \"{}\"", config.database),
            ))
            .await?;
        postgres_conn.close().await?;

        info!(database = %config.database, "Created unique test database");

        Self::with_config(config).await
    }

    /// Get the database connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Truncate every application table.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        self.conn
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                "TRUNCATE TABLE \"profile_review\", \"comment\", \"content_like\", \
                 \"following\", \"content\", \"user\" CASCADE"
                    .to_string(),
            ))
            .await?;

        info!("Cleaned up test database");
        Ok(())
    }

    /// Drop the scratch database. Consumes self because the connection must close first.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        self.conn.close().await?;

        let postgres_conn = Database::connect(&self.config.postgres_url()).await?;

        let terminate = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}'",
            self.config.database
        );
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, terminate))
            .await
            .ok();

        let drop_db = format!("DROP DATABASE IF EXISTS \"{}\"", self.config.database);
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, drop_db))
            .await?;

        postgres_conn.close().await?;

        info!(database = %self.config.database, "Dropped test database");
        Ok(())
    }

    /// Insert a minimal live account whose handle equals its id.
    pub async fn seed_user(&self, id: &str) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            id: Set(id.to_string()),
            username: Set(id.to_string()),
            username_lower: Set(id.to_lowercase()),
            email: Set(format!("{}@example.test", id.to_lowercase())),
            mobile: Set(None),
            password_hash: Set("!".to_string()),
            token: Set(Some(format!("token-{id}"))),
            role: Set(user::Role::Normal),
            is_verified: Set(true),
            name: Set(id.to_string()),
            avatar_url: Set(None),
            state: Set(None),
            job: Set(None),
            district: Set(None),
            office: Set(None),
            office_place: Set(None),
            followers_count: Set(0),
            following_count: Set(0),
            deleted_at: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        }
        .insert(&self.conn)
        .await
    }

    /// Insert an image post owned by `user_id`.
    pub async fn seed_content(&self, id: &str, user_id: &str) -> Result<content::Model, DbErr> {
        content::ActiveModel {
            id: Set(id.to_string()),
            user_id: Set(user_id.to_string()),
            kind: Set(content::ContentKind::Image),
            name: Set(Some(id.to_string())),
            media_url: Set(format!("/files/{id}.png")),
            description: Set(None),
            likes_count: Set(0),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        }
        .insert(&self.conn)
        .await
    }
}
