//! Common utilities and shared types for rapport.
//!
//! This crate provides foundational components used across all rapport crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Storage**: Media storage boundary (local filesystem backend and upload rules)
//!
//! # Example
//!
//! ```no_run
//! use rapport_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {} on port {}", id, config.server.port);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use config::{AdminSettings, Config, ConsistencyConfig, StorageSettings};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{
    LocalStorage, MediaKind, StorageBackend, UploadedFile, generate_avatar_key,
    generate_storage_key, validate_upload,
};
