//! In-crate fakes shared by unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{ArticleRecord, Credentials, PersistedArticle};
use crate::services::{Authenticator, DocumentSource, NotificationSink};
use crate::storage::{HistoryStore, InsertOutcome};

pub const ORIGIN: &str = "https://bbs.example.com";

pub fn record(title: &str, href: &str) -> ArticleRecord {
    ArticleRecord::new(title, href, ORIGIN)
}

/// Listing page markup in the forum's layout. `(title, href, pinned)`.
pub fn listing(entries: &[(&str, &str, bool)]) -> String {
    let items: String = entries
        .iter()
        .map(|(title, href, pinned)| {
            let marker = if *pinned { "<svg></svg>" } else { "" };
            format!(
                r#"<a class="articleItem" href="{href}"><div class="articleItem__titles">{marker}<div class="articleItem__title">{title}</div></div></a>"#
            )
        })
        .collect();
    format!("<html><body>{items}</body></html>")
}

/// Sink that records calls and fails for selected URLs.
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<(String, String)>>,
    times: Mutex<Vec<Instant>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(urls: &[&str]) -> Self {
        let sink = Self::new();
        sink.set_failing(urls);
        sink
    }

    pub fn set_failing(&self, urls: &[&str]) {
        *self.failing.lock().unwrap() = urls.iter().map(|u| u.to_string()).collect();
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.times.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, title: &str, url: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((title.to_string(), url.to_string()));
        self.times.lock().unwrap().push(Instant::now());

        if self.failing.lock().unwrap().contains(url) {
            return Err(AppError::sink(format!("refused {url}")));
        }
        Ok(())
    }
}

/// Plain in-memory store; keeps tests off the SQLite worker thread.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<PersistedArticle>>,
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn exists(&self, url: &str) -> Result<bool> {
        Ok(self.rows.lock().unwrap().iter().any(|a| a.url == url))
    }

    async fn insert(&self, record: &ArticleRecord) -> Result<InsertOutcome> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.iter().find(|a| a.url == record.url) {
            return Ok(InsertOutcome {
                article: existing.clone(),
                inserted: false,
            });
        }

        let article = PersistedArticle {
            id: rows.len() as i64 + 1,
            title: record.title.clone(),
            href: record.href.clone(),
            url: record.url.clone(),
            author: record.author.clone(),
            category: record.category.clone(),
            posted_at: record.posted_at.clone(),
            created_at: Utc::now(),
            notified: false,
        };
        rows.push(article.clone());
        Ok(InsertOutcome {
            article,
            inserted: true,
        })
    }

    async fn list_unnotified(&self, limit: usize) -> Result<Vec<PersistedArticle>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .rev()
            .filter(|a| !a.notified)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_notified(&self, id: i64) -> Result<()> {
        if let Some(article) = self.rows.lock().unwrap().iter_mut().find(|a| a.id == id) {
            article.notified = true;
        }
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<PersistedArticle>> {
        Ok(self.rows.lock().unwrap().iter().find(|a| a.id == id).cloned())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.rows.lock().unwrap().len() as u64)
    }
}

/// Store wrapper that injects database failures.
pub struct FailingStore {
    inner: Arc<dyn HistoryStore>,
    fail_insert_href: Option<String>,
    fail_mark: bool,
    fail_list: bool,
}

impl FailingStore {
    fn wrap(inner: Arc<dyn HistoryStore>) -> Self {
        Self {
            inner,
            fail_insert_href: None,
            fail_mark: false,
            fail_list: false,
        }
    }

    pub fn failing_insert_of(inner: Arc<dyn HistoryStore>, href: &str) -> Self {
        Self {
            fail_insert_href: Some(href.to_string()),
            ..Self::wrap(inner)
        }
    }

    pub fn failing_mark(inner: Arc<dyn HistoryStore>) -> Self {
        Self {
            fail_mark: true,
            ..Self::wrap(inner)
        }
    }

    pub fn failing_list(inner: Arc<dyn HistoryStore>) -> Self {
        Self {
            fail_list: true,
            ..Self::wrap(inner)
        }
    }

    fn io_error() -> AppError {
        AppError::Database(sqlx::Error::Io(std::io::Error::other("disk unavailable")))
    }
}

#[async_trait]
impl HistoryStore for FailingStore {
    async fn exists(&self, url: &str) -> Result<bool> {
        self.inner.exists(url).await
    }

    async fn insert(&self, record: &ArticleRecord) -> Result<InsertOutcome> {
        if self.fail_insert_href.as_deref() == Some(record.href.as_str()) {
            return Err(Self::io_error());
        }
        self.inner.insert(record).await
    }

    async fn list_unnotified(&self, limit: usize) -> Result<Vec<PersistedArticle>> {
        if self.fail_list {
            return Err(Self::io_error());
        }
        self.inner.list_unnotified(limit).await
    }

    async fn mark_notified(&self, id: i64) -> Result<()> {
        if self.fail_mark {
            return Err(Self::io_error());
        }
        self.inner.mark_notified(id).await
    }

    async fn get(&self, id: i64) -> Result<Option<PersistedArticle>> {
        self.inner.get(id).await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }
}

/// Document source with a canned answer.
pub enum StaticSource {
    Markup(String),
    Failing(String),
    /// Never completes; exercises the cycle deadline.
    Stalled,
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn fetch(&self) -> Result<String> {
        match self {
            Self::Markup(markup) => Ok(markup.clone()),
            Self::Failing(message) => Err(AppError::retrieval("listing", message)),
            Self::Stalled => std::future::pending().await,
        }
    }
}

/// Authenticator counting its calls.
#[derive(Default)]
pub struct FakeLogin {
    pub calls: AtomicUsize,
    pub reject: bool,
}

impl FakeLogin {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for FakeLogin {
    async fn login(&self, _credentials: &Credentials) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(AppError::retrieval("login", "bad credentials"));
        }
        Ok(())
    }
}

/// Client for talking to [`http_stub`], bypassing any proxy from the environment.
pub fn local_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Local HTTP server answering every request with `status` and `body`.
///
/// Returns the base URL, e.g. `http://127.0.0.1:40123`.
pub async fn http_stub(status: u16, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

/// Consume request head and body so the client never sees a reset.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return Ok(());
            }
        }
    }
}
