//! Article data structures.

use chrono::{DateTime, Utc};

use crate::utils::{extract_article_id, join_origin};

/// An article entry extracted from the listing page.
///
/// Lives for a single poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArticleRecord {
    /// Display title (never empty once extracted)
    pub title: String,

    /// Site-relative path, the identity source
    pub href: String,

    /// Absolute URL, the deduplication key
    pub url: String,

    /// Author nickname (may be empty)
    pub author: String,

    /// Category or tag label (may be empty)
    pub category: String,

    /// Posted time as displayed by the site (may be empty)
    pub posted_at: String,

    /// Promoted/official entry marker
    pub pinned: bool,
}

impl ArticleRecord {
    /// Create a record, deriving the absolute URL from `href` and the site origin.
    pub fn new(title: impl Into<String>, href: impl Into<String>, origin: &str) -> Self {
        let href = href.into();
        Self {
            title: title.into(),
            url: join_origin(origin, &href),
            href,
            ..Self::default()
        }
    }

    /// Numeric article id found after `prefix` in the href, or an empty string.
    pub fn source_id(&self, prefix: &str) -> String {
        extract_article_id(&self.href, prefix).unwrap_or_default()
    }
}

/// An article as stored in the history store.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PersistedArticle {
    /// Store-assigned identifier
    pub id: i64,
    pub title: String,
    pub href: String,
    pub url: String,
    pub author: String,
    pub category: String,
    pub posted_at: String,

    /// First time this URL was observed
    pub created_at: DateTime<Utc>,

    /// Set once the notification sink confirmed delivery
    pub notified: bool,
}
