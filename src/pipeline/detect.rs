//! Change detection against the history store.
//!
//! Unlike a snapshot diff, novelty is decided by the durable store: a record
//! is new exactly when this pass created its row. A re-run over the same
//! records therefore reports nothing.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{ArticleRecord, PersistedArticle};
use crate::storage::HistoryStore;

/// Computes and persists the newly seen articles of a cycle.
#[derive(Clone)]
pub struct ChangeDetector {
    store: Arc<dyn HistoryStore>,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Persist unseen records and return them in input order.
    ///
    /// Pinned records are ignored. A store failure aborts the pass; rows
    /// inserted before the failure stay committed.
    pub async fn detect(&self, records: &[ArticleRecord]) -> Result<Vec<PersistedArticle>> {
        let mut fresh = Vec::new();

        for record in records {
            if record.pinned {
                log::debug!("Ignoring pinned record {}", record.url);
                continue;
            }

            if self.store.exists(&record.url).await? {
                continue;
            }

            let outcome = self.store.insert(record).await?;
            if outcome.inserted {
                log::info!(
                    "New article #{}: '{}' ({})",
                    outcome.id(),
                    outcome.article.title,
                    outcome.article.url
                );
                fresh.push(outcome.article);
            } else {
                log::debug!("Article {} was stored concurrently", record.url);
            }
        }

        Ok(fresh)
    }
}
