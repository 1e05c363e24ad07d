// src/services/source.rs

//! Listing page retrieval.
//!
//! - `HttpSource`: anonymous GET of the listing page
//! - `FormLogin`: posts credentials so the shared client holds a session

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{AuthConfig, Credentials};
use crate::utils::http::fetch_text;

/// Supplies the raw markup of the listing page.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self) -> Result<String>;
}

/// Establishes a session before the listing is fetched.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<()>;
}

/// Fetches the listing page with a plain GET.
pub struct HttpSource {
    client: reqwest::Client,
    listing_url: String,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, listing_url: impl Into<String>) -> Self {
        Self {
            client,
            listing_url: listing_url.into(),
        }
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch(&self) -> Result<String> {
        log::debug!("Fetching listing {}", self.listing_url);
        let markup = fetch_text(&self.client, &self.listing_url).await?;
        log::debug!("Fetched {} bytes", markup.len());
        Ok(markup)
    }
}

/// Logs in by posting a form; the session lives in the client's cookie store.
pub struct FormLogin {
    client: reqwest::Client,
    login_url: String,
    username_field: String,
    password_field: String,
}

impl FormLogin {
    /// `client` must be the same cookie-enabled client the source uses.
    pub fn new(client: reqwest::Client, auth: &AuthConfig) -> Self {
        Self {
            client,
            login_url: auth.login_url.clone(),
            username_field: auth.username_field.clone(),
            password_field: auth.password_field.clone(),
        }
    }

    fn form<'a>(&'a self, credentials: &'a Credentials) -> [(&'a str, &'a str); 2] {
        [
            (self.username_field.as_str(), credentials.username.as_str()),
            (self.password_field.as_str(), credentials.password.as_str()),
        ]
    }
}

#[async_trait]
impl Authenticator for FormLogin {
    async fn login(&self, credentials: &Credentials) -> Result<()> {
        log::info!("Logging in as {}", credentials.username);

        let response = self
            .client
            .post(&self.login_url)
            .form(&self.form(credentials))
            .send()
            .await
            .map_err(|e| AppError::retrieval(&self.login_url, format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::retrieval(
                &self.login_url,
                format!("login rejected with status {status}"),
            ));
        }

        log::info!("Login succeeded");
        Ok(())
    }
}
