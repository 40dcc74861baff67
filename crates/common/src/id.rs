//! ID generation utilities.

use std::sync::Mutex;

use ulid::{Generator, Ulid};
use uuid::Uuid;

/// Process-wide monotonic ULID source.
static MONOTONIC: Mutex<Generator> = Mutex::new(Generator::new());

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// IDs generated by one process are strictly increasing, even within the
    /// same millisecond, so sorting by ID reproduces insertion order (comment
    /// sequences and cursor pagination rely on this).
    #[must_use]
    pub fn generate(&self) -> String {
        let ulid = MONOTONIC
            .lock()
            .ok()
            .and_then(|mut generator| generator.generate().ok())
            .unwrap_or_else(Ulid::new);
        ulid.to_string().to_lowercase()
    }

    /// Generate an opaque access token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        // No time component in tokens
        Uuid::new_v4().simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_eq!(id2.len(), 26);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_generate_is_monotonic() {
        let id_gen = IdGenerator::new();
        let ids: Vec<String> = (0..256).map(|_| id_gen.generate()).collect();

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_generate_token() {
        let id_gen = IdGenerator::new();
        let token = id_gen.generate_token();

        assert_eq!(token.len(), 32);
        assert_ne!(token, id_gen.generate_token());
    }
}
