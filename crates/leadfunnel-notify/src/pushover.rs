//! Pushover message API.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

const DEFAULT_BASE_URL: &str = "https://api.pushover.net/1/";

pub struct PushoverClient {
    client: Client,
    app_token: String,
    user_key: String,
    base_url: Url,
}

#[derive(Debug, Serialize)]
struct MessageForm<'a> {
    token: &'a str,
    user: &'a str,
    title: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    status: i64,
    #[serde(default)]
    errors: Vec<String>,
}

impl PushoverClient {
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(app_token: &str, user_key: &str, timeout_secs: u64) -> Result<Self, NotifyError> {
        Self::with_base_url(app_token, user_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the client cannot be built, or
    /// [`NotifyError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        app_token: &str,
        user_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, NotifyError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            app_token: app_token.to_owned(),
            user_key: user_key.to_owned(),
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Pushes `message` to the configured user or group key.
    ///
    /// # Errors
    ///
    /// - [`NotifyError::Http`] on network failure or timeout.
    /// - [`NotifyError::UnexpectedStatus`] on a non-2xx response.
    /// - [`NotifyError::Rejected`] when Pushover answers with `status != 1`.
    pub async fn send(&self, title: &str, message: &str, url: Option<&str>) -> Result<(), NotifyError> {
        let endpoint = self
            .base_url
            .join("messages.json")
            .unwrap_or_else(|_| self.base_url.clone());

        let response = self
            .client
            .post(endpoint)
            .form(&MessageForm {
                token: &self.app_token,
                user: &self.user_key,
                title,
                message,
                url,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::UnexpectedStatus {
                vendor: "pushover",
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: MessageResponse = response.json().await?;
        if parsed.status != 1 {
            return Err(NotifyError::Rejected {
                vendor: "pushover",
                message: parsed.errors.join("; "),
            });
        }
        Ok(())
    }
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, NotifyError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, NotifyError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| NotifyError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}
