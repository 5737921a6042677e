//! Twilio Programmable Messaging and Voice.

use leadfunnel_core::to_e164;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;
use crate::pushover::{build_client, parse_base_url};

const DEFAULT_BASE_URL: &str = "https://api.twilio.com/2010-04-01/";

pub struct TwilioClient {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    base_url: Url,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MessageForm<'a> {
    to: &'a str,
    from: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CallForm<'a> {
    to: &'a str,
    from: &'a str,
    twiml: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResourceResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: String,
}

impl TwilioClient {
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        account_sid: &str,
        auth_token: &str,
        from_number: &str,
        timeout_secs: u64,
    ) -> Result<Self, NotifyError> {
        Self::with_base_url(account_sid, auth_token, from_number, timeout_secs, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the client cannot be built, or
    /// [`NotifyError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        account_sid: &str,
        auth_token: &str,
        from_number: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, NotifyError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            account_sid: account_sid.to_owned(),
            auth_token: auth_token.to_owned(),
            from_number: from_number.to_owned(),
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Sends an SMS and returns the message SID.
    ///
    /// # Errors
    ///
    /// [`NotifyError::InvalidPhone`] if `to` is not a dialable number, or any
    /// error from the Messages resource.
    pub async fn send_sms(&self, to: &str, body: &str) -> Result<String, NotifyError> {
        let to = e164(to)?;
        let from = e164(&self.from_number)?;
        self.post(
            "Messages.json",
            &MessageForm {
                to: &to,
                from: &from,
                body,
            },
        )
        .await
    }

    /// Sends a WhatsApp message from `from` (a WhatsApp-enabled sender).
    ///
    /// # Errors
    ///
    /// Same as [`TwilioClient::send_sms`].
    pub async fn send_whatsapp(&self, from: &str, to: &str, body: &str) -> Result<String, NotifyError> {
        let to = format!("whatsapp:{}", e164(to)?);
        let from = format!("whatsapp:{}", e164(from.trim_start_matches("whatsapp:"))?);
        self.post(
            "Messages.json",
            &MessageForm {
                to: &to,
                from: &from,
                body,
            },
        )
        .await
    }

    /// Places a call that plays the inline `twiml` document.
    ///
    /// # Errors
    ///
    /// Same as [`TwilioClient::send_sms`], against the Calls resource.
    pub async fn call(&self, to: &str, twiml: &str) -> Result<String, NotifyError> {
        let to = e164(to)?;
        let from = e164(&self.from_number)?;
        self.post(
            "Calls.json",
            &CallForm {
                to: &to,
                from: &from,
                twiml,
            },
        )
        .await
    }

    async fn post<T: Serialize + ?Sized>(&self, resource: &str, form: &T) -> Result<String, NotifyError> {
        let path = format!("Accounts/{}/{resource}", self.account_sid);
        let url = self
            .base_url
            .join(&path)
            .map_err(|e| NotifyError::InvalidBaseUrl {
                url: format!("{}{path}", self.base_url),
                reason: e.to_string(),
            })?;

        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(NotifyError::UnexpectedStatus {
                vendor: "twilio",
                status: status.as_u16(),
                body: message,
            });
        }

        let created: ResourceResponse = response.json().await?;
        tracing::debug!(resource, sid = %created.sid, "twilio resource created");
        Ok(created.sid)
    }
}

fn e164(raw: &str) -> Result<String, NotifyError> {
    to_e164(raw).ok_or_else(|| NotifyError::InvalidPhone(raw.to_string()))
}
