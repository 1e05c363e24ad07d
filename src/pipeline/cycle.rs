// src/pipeline/cycle.rs

//! One poll cycle: fetch → extract → detect → dispatch.
//!
//! A cycle never propagates an error. Whatever happens, it returns a
//! [`CycleReport`] and the caller goes back to idle. All cross-cycle memory
//! lives in the history store, so a cycle can be abandoned at any point.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{Config, Credentials, PersistedArticle, RetrievalMode};
use crate::pipeline::detect::ChangeDetector;
use crate::pipeline::diagnostics::dump_markup;
use crate::pipeline::dispatch::{DispatchReport, Dispatcher};
use crate::services::{
    Authenticator, DocumentSource, FormLogin, HttpSource, NotificationSink, RecordExtractor,
    WebhookSink,
};
use crate::storage::HistoryStore;
use crate::utils::http::create_async_client;

/// Where a cycle is (or was when it stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Fetching,
    Extracting,
    Detecting,
    Dispatching,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::Idle => "idle",
            CycleStage::Fetching => "fetching",
            CycleStage::Extracting => "extracting",
            CycleStage::Detecting => "detecting",
            CycleStage::Dispatching => "dispatching",
        };
        f.write_str(name)
    }
}

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleStatus {
    Completed,
    Failed { stage: CycleStage, error: AppError },
    TimedOut { stage: CycleStage },
}

/// Summary of a cycle run.
#[derive(Debug)]
pub struct CycleReport {
    pub status: CycleStatus,
    /// Non-pinned records extracted from the page
    pub extracted: usize,
    /// Articles first seen in this cycle
    pub new_articles: Vec<PersistedArticle>,
    pub dispatch: DispatchReport,
    /// Raw markup dump written because nothing was extracted
    pub dump: Option<PathBuf>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, CycleStatus::Completed)
    }
}

/// Per-cycle policy values.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Extraction cap
    pub cap: usize,
    /// Unnotified rows handed to the dispatcher
    pub batch_limit: usize,
    /// Overall deadline
    pub deadline: Duration,
    /// Dump directory for empty extractions; `None` disables dumps
    pub dump_dir: Option<PathBuf>,
}

impl CycleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cap: config.detection.cap(),
            batch_limit: config.notifier.batch_limit,
            deadline: config.cycle_timeout(),
            dump_dir: config
                .diagnostics
                .dump_on_empty
                .then(|| config.diagnostics.dump_dir.clone()),
        }
    }
}

/// Wires the collaborators of one poll cycle together.
pub struct PollCycle {
    source: Arc<dyn DocumentSource>,
    login: Option<(Arc<dyn Authenticator>, Credentials)>,
    extractor: RecordExtractor,
    detector: ChangeDetector,
    dispatcher: Dispatcher,
    store: Arc<dyn HistoryStore>,
    settings: CycleSettings,
}

impl PollCycle {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        extractor: RecordExtractor,
        store: Arc<dyn HistoryStore>,
        sink: Arc<dyn NotificationSink>,
        min_interval: Duration,
        settings: CycleSettings,
    ) -> Self {
        Self {
            source,
            login: None,
            extractor,
            detector: ChangeDetector::new(Arc::clone(&store)),
            dispatcher: Dispatcher::new(sink, Arc::clone(&store), min_interval),
            store,
            settings,
        }
    }

    /// Log in with `credentials` before every fetch.
    pub fn with_login(
        mut self,
        authenticator: Arc<dyn Authenticator>,
        credentials: Credentials,
    ) -> Self {
        self.login = Some((authenticator, credentials));
        self
    }

    /// Build a cycle with the HTTP collaborators described by `config`.
    pub fn from_config(config: &Config, store: Arc<dyn HistoryStore>) -> Result<Self> {
        let client = create_async_client(&config.crawler)?;
        let source = Arc::new(HttpSource::new(client.clone(), &config.site.listing_url));
        let sink = Arc::new(WebhookSink::from_config(config, client.clone())?);
        let extractor = RecordExtractor::new(&config.selectors, &config.site.origin)?;

        let cycle = Self::new(
            source,
            extractor,
            store,
            sink,
            config.notifier.min_interval(),
            CycleSettings::from_config(config),
        );

        match config.retrieval.mode {
            RetrievalMode::Http => Ok(cycle),
            RetrievalMode::Session => {
                let credentials = config.credentials().ok_or_else(|| {
                    AppError::config("session retrieval requires credentials")
                })?;
                let login = Arc::new(FormLogin::new(client, &config.auth));
                Ok(cycle.with_login(login, credentials))
            }
        }
    }

    /// Run one cycle within the configured deadline.
    pub async fn run(&self) -> CycleReport {
        let started = Instant::now();
        let mut stage = CycleStage::Idle;
        let mut report = CycleReport {
            status: CycleStatus::Completed,
            extracted: 0,
            new_articles: Vec::new(),
            dispatch: DispatchReport::default(),
            dump: None,
            elapsed: Duration::ZERO,
        };

        let outcome = tokio::time::timeout(
            self.settings.deadline,
            self.run_stages(&mut stage, &mut report),
        )
        .await;

        report.status = match outcome {
            Ok(Ok(())) => CycleStatus::Completed,
            Ok(Err(error)) => {
                log::error!("Cycle failed while {}: {}", stage, error);
                CycleStatus::Failed { stage, error }
            }
            Err(_) => {
                log::error!(
                    "{}",
                    AppError::Timeout {
                        stage: stage.to_string(),
                        secs: self.settings.deadline.as_secs(),
                    }
                );
                CycleStatus::TimedOut { stage }
            }
        };
        report.elapsed = started.elapsed();

        if report.is_completed() {
            log::info!(
                "Cycle complete in {:.1}s: {} extracted, {} new, {} notified, {} failed",
                report.elapsed.as_secs_f64(),
                report.extracted,
                report.new_articles.len(),
                report.dispatch.delivered,
                report.dispatch.failed
            );
        }
        report
    }

    async fn run_stages(&self, stage: &mut CycleStage, report: &mut CycleReport) -> Result<()> {
        *stage = CycleStage::Fetching;
        if let Some((authenticator, credentials)) = &self.login {
            authenticator.login(credentials).await?;
        }
        let markup = self.source.fetch().await?;

        *stage = CycleStage::Extracting;
        let extraction = self.extractor.extract(&markup, self.settings.cap)?;
        report.extracted = extraction.records.len();
        log::info!(
            "Extracted {} articles ({} pinned, {} skipped)",
            extraction.records.len(),
            extraction.pinned,
            extraction.skipped
        );

        if extraction.is_empty() {
            log::warn!("No articles found on the listing page");
            if let Some(dir) = &self.settings.dump_dir {
                match dump_markup(dir, &markup).await {
                    Ok(path) => {
                        log::warn!("Saved page markup to {} for inspection", path.display());
                        report.dump = Some(path);
                    }
                    Err(e) => log::warn!("Could not save page markup: {}", e),
                }
            }
        }

        *stage = CycleStage::Detecting;
        report.new_articles = self.detector.detect(&extraction.records).await?;
        if report.new_articles.is_empty() {
            log::info!("No new articles");
        }

        *stage = CycleStage::Dispatching;
        let pending = self.store.list_unnotified(self.settings.batch_limit).await?;
        if !pending.is_empty() {
            report.dispatch = self.dispatcher.dispatch(&pending).await;
        }

        *stage = CycleStage::Idle;
        Ok(())
    }
}
