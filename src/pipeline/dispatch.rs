//! Notification dispatch.
//!
//! Delivery is at-least-once: an article is only marked notified after the
//! sink confirmed it, so a crash or a failed mark means a resend next cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::models::PersistedArticle;
use crate::services::NotificationSink;
use crate::storage::HistoryStore;

/// Outcome of one dispatch batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Sink confirmed delivery
    pub delivered: usize,
    /// Sink rejected or was unreachable
    pub failed: usize,
    /// Delivered but the notified flag could not be stored
    pub unmarked: usize,
}

/// Sends notifications for unnotified articles and records delivery.
pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn HistoryStore>,
    min_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn HistoryStore>,
        min_interval: Duration,
    ) -> Self {
        Self {
            sink,
            store,
            min_interval,
        }
    }

    /// Notify each article in order, spacing sink calls by `min_interval`.
    ///
    /// One failure never stops the rest of the batch.
    pub async fn dispatch(&self, articles: &[PersistedArticle]) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut last_call: Option<Instant> = None;

        for article in articles.iter().filter(|a| !a.notified) {
            if let Some(last) = last_call {
                let elapsed = last.elapsed();
                if elapsed < self.min_interval {
                    tokio::time::sleep(self.min_interval - elapsed).await;
                }
            }
            last_call = Some(Instant::now());

            if let Err(e) = self.sink.send(&article.title, &article.url).await {
                log::warn!(
                    "Notification for article #{} ({}) failed: {}",
                    article.id,
                    article.url,
                    e
                );
                report.failed += 1;
                continue;
            }

            report.delivered += 1;
            match self.store.mark_notified(article.id).await {
                Ok(()) => log::info!("Notified article #{}: '{}'", article.id, article.title),
                Err(e) => {
                    log::error!(
                        "Article #{} was delivered but could not be marked notified; it will be resent: {}",
                        article.id,
                        e
                    );
                    report.unmarked += 1;
                }
            }
        }

        report
    }
}
