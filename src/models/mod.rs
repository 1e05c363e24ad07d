// src/models/mod.rs

//! Domain models for the monitor.

mod article;
mod config;
mod selectors;

// Re-export all public types
pub use article::{ArticleRecord, PersistedArticle};
pub use config::{
    AuthConfig, Config, CrawlerConfig, Credentials, DetectionConfig, DetectionMode,
    DiagnosticsConfig, NotifierConfig, RetrievalMode, ScheduleConfig, SiteConfig,
    ENV_PASSWORD, ENV_USERNAME, ENV_WEBHOOK_URL,
};
pub use selectors::ListingSelectors;
