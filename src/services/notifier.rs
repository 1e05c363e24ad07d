// src/services/notifier.rs

//! Notification sink.
//!
//! The default sink posts a Feishu-style text message to a webhook.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::Config;

/// External destination for new-article notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification. `Ok` means the receiver confirmed it.
    async fn send(&self, title: &str, url: &str) -> Result<()>;
}

/// Webhook sink posting `{"msg_type": "text", ...}` payloads.
pub struct WebhookSink {
    client: reqwest::Client,
    webhook_url: String,
    template: String,
}

impl WebhookSink {
    pub fn new(
        client: reqwest::Client,
        webhook_url: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
            template: template.into(),
        }
    }

    /// Build the sink from the notifier config. Fails when no webhook is set.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self> {
        let webhook_url = config.require_webhook()?;
        Ok(Self::new(client, webhook_url, &config.notifier.template))
    }

    /// Render the message text.
    ///
    /// Supported placeholders: `{title}`, `{url}`.
    pub fn render(&self, title: &str, url: &str) -> String {
        self.template
            .split("{title}")
            .map(|part| part.replace("{url}", url))
            .collect::<Vec<_>>()
            .join(title)
    }

    fn payload(text: &str) -> Value {
        json!({
            "msg_type": "text",
            "content": { "text": text },
        })
    }

    /// Interpret the webhook's JSON reply; a non-zero `code` is a rejection.
    fn check_reply(reply: &Value) -> Result<()> {
        let code = reply
            .get("code")
            .or_else(|| reply.get("StatusCode"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if code == 0 {
            return Ok(());
        }

        let message = reply
            .get("msg")
            .or_else(|| reply.get("StatusMessage"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        Err(AppError::sink(format!(
            "webhook rejected message (code {code}): {message}"
        )))
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, title: &str, url: &str) -> Result<()> {
        let payload = Self::payload(&self.render(title, url));

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::sink(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::sink(format!("webhook returned status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::sink(format!("webhook reply unreadable: {e}")))?;
        match serde_json::from_str::<Value>(&body) {
            Ok(reply) => Self::check_reply(&reply),
            // Non-JSON bodies are accepted on a 2xx status.
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{http_stub, local_client};

    async fn send_via_stub(status: u16, reply: &'static str) -> Result<()> {
        let base = http_stub(status, reply).await;
        WebhookSink::new(local_client(), format!("{base}/hook"), "{title} {url}")
            .send("Gimbal", "https://bbs.example.com/article/9")
            .await
    }

    #[tokio::test]
    async fn test_send_accepted() {
        assert!(send_via_stub(200, r#"{"code":0,"msg":"success"}"#).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_error_status_is_sink_error() {
        let err = send_via_stub(503, "").await.unwrap_err();
        assert!(matches!(err, AppError::Sink(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_send_rejected_code_is_sink_error() {
        let err = send_via_stub(200, r#"{"code":19001,"msg":"param invalid"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Sink(_)));
        assert!(err.to_string().contains("19001"));
    }

    #[test]
    fn test_render_placeholder_text_in_title_kept() {
        assert_eq!(
            sink("{title}\n{url}").render("About {url} placeholders", "https://x/article/1"),
            "About {url} placeholders\nhttps://x/article/1"
        );
    }

    fn sink(template: &str) -> WebhookSink {
        WebhookSink::new(
            reqwest::Client::new(),
            "https://hooks.example.com/bot",
            template,
        )
    }

    #[test]
    fn test_render_template() {
        let sink = sink("[forum] {title} -> {url}");
        assert_eq!(
            sink.render("Open-source gimbal", "https://bbs.example.com/article/9"),
            "[forum] Open-source gimbal -> https://bbs.example.com/article/9"
        );
    }

    #[test]
    fn test_payload_shape() {
        let payload = WebhookSink::payload("hello");
        assert_eq!(payload["msg_type"], "text");
        assert_eq!(payload["content"]["text"], "hello");
    }

    #[test]
    fn test_check_reply() {
        assert!(WebhookSink::check_reply(&json!({"code": 0, "msg": "success"})).is_ok());
        assert!(WebhookSink::check_reply(&json!({"StatusCode": 0})).is_ok());
        assert!(WebhookSink::check_reply(&json!({})).is_ok());

        let err = WebhookSink::check_reply(&json!({"code": 19001, "msg": "param invalid"}))
            .unwrap_err();
        assert!(matches!(err, AppError::Sink(_)));
        assert!(err.to_string().contains("param invalid"));
    }

    #[test]
    fn test_from_config_requires_webhook() {
        let mut config = Config::default();
        assert!(WebhookSink::from_config(&config, reqwest::Client::new()).is_err());

        config.notifier.webhook_url = Some("https://hooks.example.com/bot".into());
        let sink = WebhookSink::from_config(&config, reqwest::Client::new()).unwrap();
        assert_eq!(sink.webhook_url, "https://hooks.example.com/bot");
    }
}
