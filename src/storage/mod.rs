//! Storage abstractions for article history.
//!
//! The history store is the only cross-cycle memory of the monitor: it
//! decides novelty (by `url`) and remembers which articles were notified.
//!
//! ## Schema
//!
//! ```text
//! articles
//! ├── id          INTEGER PRIMARY KEY AUTOINCREMENT
//! ├── url         TEXT NOT NULL UNIQUE   # dedup key
//! ├── title, href, author, category, posted_at
//! ├── created_at  TEXT (RFC 3339)
//! └── notified    BOOLEAN                # false -> true only
//! ```

pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ArticleRecord, PersistedArticle};

// Re-export for convenience
pub use sqlite::SqliteHistory;

/// Result of an insert-or-ignore write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    /// The canonical stored row for the URL
    pub article: PersistedArticle,
    /// True when this call created the row
    pub inserted: bool,
}

impl InsertOutcome {
    pub fn id(&self) -> i64 {
        self.article.id
    }
}

/// Durable set of previously seen articles, keyed by URL.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Whether an article with this URL was ever stored.
    async fn exists(&self, url: &str) -> Result<bool>;

    /// Insert the record unless its URL is already stored.
    ///
    /// Never fails on a duplicate URL; the existing row is returned instead.
    async fn insert(&self, record: &ArticleRecord) -> Result<InsertOutcome>;

    /// Unnotified articles, most recently inserted first.
    async fn list_unnotified(&self, limit: usize) -> Result<Vec<PersistedArticle>>;

    /// Set `notified`. Marking twice is not an error.
    async fn mark_notified(&self, id: i64) -> Result<()>;

    /// Look up a stored article by id.
    async fn get(&self, id: i64) -> Result<Option<PersistedArticle>>;

    /// Number of stored articles.
    async fn count(&self) -> Result<u64>;
}
