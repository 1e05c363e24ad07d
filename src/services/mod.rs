//! Service layer for the monitor.
//!
//! This module contains:
//! - Article extraction (`RecordExtractor`)
//! - Listing retrieval (`DocumentSource`, `HttpSource`, `FormLogin`)
//! - Notification delivery (`NotificationSink`, `WebhookSink`)

mod extractor;
mod notifier;
mod source;

pub use extractor::{Extraction, RecordExtractor};
pub use notifier::{NotificationSink, WebhookSink};
pub use source::{Authenticator, DocumentSource, FormLogin, HttpSource};
