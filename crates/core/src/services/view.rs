//! Read-side projections shared by several services.

use rapport_db::entities::user;
use serde::Serialize;

/// Largest page any listing returns.
pub const MAX_PAGE_LIMIT: u64 = 100;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u64 = 20;

/// Public face of an account inside listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: String,
    pub username: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl From<&user::Model> for AccountSummary {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

impl AccountSummary {
    /// Stand-in for an author whose account is gone.
    #[must_use]
    pub fn deleted(id: &str) -> Self {
        Self {
            id: id.to_string(),
            username: "deleted".to_string(),
            name: "Deleted account".to_string(),
            avatar_url: None,
        }
    }
}

/// One page of a cursor listing.
///
/// `next_until_id` is the cursor for the following page, absent once the
/// listing is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_until_id: Option<String>,
}

/// Clamp a requested page size into `1..=MAX_PAGE_LIMIT`.
#[must_use]
pub fn clamp_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

/// Cursor for the next page: the last row id, but only after a full page.
pub(crate) fn next_cursor(rows: usize, last_id: Option<&str>, limit: u64) -> Option<String> {
    if (rows as u64) < limit {
        return None;
    }
    last_id.map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_PAGE_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1000)), MAX_PAGE_LIMIT);
        assert_eq!(clamp_limit(Some(7)), 7);
    }

    #[test]
    fn test_deleted_summary_keeps_id() {
        let summary = AccountSummary::deleted("ghost");
        assert_eq!(summary.id, "ghost");
        assert_eq!(summary.name, "Deleted account");
        assert_eq!(summary.avatar_url, None);
    }

    #[test]
    fn test_next_cursor_short_page_ends_listing() {
        assert_eq!(next_cursor(2, Some("b"), 3), None);
    }

    #[test]
    fn test_next_cursor_full_page_points_at_last() {
        assert_eq!(next_cursor(3, Some("a"), 3), Some("a".to_string()));
    }
}
