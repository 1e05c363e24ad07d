//! SQLite history store.
//!
//! Every operation is a single statement, so a failure never leaves a
//! half-written row behind. Rows are never deleted, which makes reading back
//! the canonical row after an ignored insert race-free.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::{AppError, Result};
use crate::models::{ArticleRecord, PersistedArticle};
use crate::storage::{HistoryStore, InsertOutcome};

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum pooled connections for file-backed stores.
const MAX_CONNECTIONS: u32 = 4;

/// SQLite-backed [`HistoryStore`].
#[derive(Clone)]
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        log::info!("History store opened at {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Each in-memory connection is a separate database: keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                href TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                author TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                posted_at TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                notified BOOLEAN NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_unnotified ON articles(notified, id DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<PersistedArticle>> {
        let article = sqlx::query_as::<_, PersistedArticle>(
            r#"
            SELECT id, title, href, url, author, category, posted_at, created_at, notified
            FROM articles
            WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    /// Close the pool, waiting for in-flight statements.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    async fn exists(&self, url: &str) -> Result<bool> {
        let found: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM articles WHERE url = ?)")
                .bind(url)
                .fetch_one(&self.pool)
                .await?;
        Ok(found != 0)
    }

    async fn insert(&self, record: &ArticleRecord) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (title, href, url, author, category, posted_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
        "#,
        )
        .bind(&record.title)
        .bind(&record.href)
        .bind(&record.url)
        .bind(&record.author)
        .bind(&record.category)
        .bind(&record.posted_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        let article = self
            .find_by_url(&record.url)
            .await?
            .ok_or(AppError::Database(sqlx::Error::RowNotFound))?;

        Ok(InsertOutcome { article, inserted })
    }

    async fn list_unnotified(&self, limit: usize) -> Result<Vec<PersistedArticle>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let articles = sqlx::query_as::<_, PersistedArticle>(
            r#"
            SELECT id, title, href, url, author, category, posted_at, created_at, notified
            FROM articles
            WHERE notified = 0
            ORDER BY id DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    async fn mark_notified(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE articles SET notified = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<PersistedArticle>> {
        let article = sqlx::query_as::<_, PersistedArticle>(
            r#"
            SELECT id, title, href, url, author, category, posted_at, created_at, notified
            FROM articles
            WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
