//! Fan-out of one alert to every configured staff channel.

use futures::future::{join_all, BoxFuture, FutureExt};
use leadfunnel_core::{format_phone, format_usd, AppConfig, LeadId};
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;
use crate::pushover::PushoverClient;
use crate::twilio::TwilioClient;
use crate::twiml;

/// What staff need to know about a freshly submitted lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub lead_id: LeadId,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub estimated_value: Option<i64>,
}

impl LeadSummary {
    #[must_use]
    pub fn message(&self) -> String {
        let mut lines = vec![
            format!("Name: {}", self.name),
            format!("Phone: {}", format_phone(&self.phone)),
        ];
        if let Some(email) = &self.email {
            lines.push(format!("Email: {email}"));
        }
        if let Some(address) = &self.address {
            lines.push(format!("Address: {address}"));
        }
        if let Some(value) = self.estimated_value.filter(|v| *v > 0) {
            lines.push(format!("Estimated value: {}", format_usd(value)));
        }
        lines.push(format!("Lead: {}", self.lead_id));
        lines.join("\n")
    }

    /// Sentence read out on the staff call. Digits are spaced so the voice
    /// reads them one by one.
    #[must_use]
    pub fn voice_script(&self) -> String {
        let digits: Vec<String> = self
            .phone
            .chars()
            .filter(char::is_ascii_digit)
            .map(String::from)
            .collect();
        let mut script = format!(
            "New lead from {}. Phone number {}.",
            self.name,
            digits.join(" ")
        );
        if let Some(address) = &self.address {
            script = format!("{script} Property at {address}.");
        }
        script
    }

    #[must_use]
    pub fn to_alert(&self) -> StaffAlert {
        StaffAlert {
            title: format!("New lead: {}", self.name),
            message: self.message(),
            voice: Some(self.voice_script()),
        }
    }
}

/// A free-form staff alert. `voice` set means staff phones are also called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffAlert {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOutcome {
    pub channel: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelOutcome {
    fn from_result<T>(channel: &'static str, target: Option<String>, result: Result<T, NotifyError>) -> Self {
        let error = match result {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(channel, target = ?target, error = %e, "staff notification failed");
                Some(e.to_string())
            }
        };
        Self {
            channel,
            target,
            error,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Default)]
pub struct StaffNotifier {
    pushover: Option<PushoverClient>,
    twilio: Option<TwilioClient>,
    staff_phones: Vec<String>,
    whatsapp_from: Option<String>,
}

impl StaffNotifier {
    #[must_use]
    pub fn new(pushover: Option<PushoverClient>, twilio: Option<TwilioClient>, staff_phones: Vec<String>) -> Self {
        Self {
            pushover,
            twilio,
            staff_phones,
            whatsapp_from: None,
        }
    }

    #[must_use]
    pub fn with_whatsapp_from(mut self, from: impl Into<String>) -> Self {
        self.whatsapp_from = Some(from.into());
        self
    }

    /// Builds whichever channels have credentials.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, NotifyError> {
        let vendors = &config.vendors;
        let timeout = config.vendor_timeout_secs;

        let pushover = match (&vendors.pushover_app_token, &vendors.pushover_user_key) {
            (Some(token), Some(user)) => Some(PushoverClient::new(token, user, timeout)?),
            _ => {
                tracing::warn!("PUSHOVER_APP_TOKEN/PUSHOVER_USER_KEY not set; push alerts disabled");
                None
            }
        };

        let twilio = match (
            &vendors.twilio_account_sid,
            &vendors.twilio_auth_token,
            &vendors.twilio_from_number,
        ) {
            (Some(sid), Some(token), Some(from)) => Some(TwilioClient::new(sid, token, from, timeout)?),
            _ => {
                tracing::warn!("TWILIO_ACCOUNT_SID/TWILIO_AUTH_TOKEN/TWILIO_FROM_NUMBER not set; SMS and calls disabled");
                None
            }
        };

        if twilio.is_some() && config.staff_phones.is_empty() {
            tracing::warn!("FUNNEL_STAFF_PHONES is empty; no one will get SMS or calls");
        }

        let mut notifier = Self::new(pushover, twilio, config.staff_phones.clone());
        if let Some(from) = &vendors.twilio_whatsapp_from {
            notifier = notifier.with_whatsapp_from(from);
        }
        Ok(notifier)
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.pushover.is_some() || (self.twilio.is_some() && !self.staff_phones.is_empty())
    }

    pub async fn lead_submitted(&self, summary: &LeadSummary) -> Vec<ChannelOutcome> {
        tracing::info!(lead_id = %summary.lead_id, "notifying staff of submitted lead");
        self.send(&summary.to_alert()).await
    }

    /// Sends `alert` on every channel concurrently. Outcomes are listed
    /// push first, then per phone in configuration order.
    pub async fn send(&self, alert: &StaffAlert) -> Vec<ChannelOutcome> {
        let mut jobs: Vec<BoxFuture<'_, ChannelOutcome>> = Vec::new();

        if let Some(pushover) = &self.pushover {
            jobs.push(
                async move {
                    let result = pushover.send(&alert.title, &alert.message, None).await;
                    ChannelOutcome::from_result("pushover", None, result)
                }
                .boxed(),
            );
        }

        if let Some(twilio) = &self.twilio {
            let sms_body = format!("{}\n{}", alert.title, alert.message);
            let twiml = match alert.voice.as_deref().map(twiml::say).transpose() {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(error = %e, "could not render call TwiML; skipping calls");
                    None
                }
            };

            for phone in &self.staff_phones {
                let body = sms_body.clone();
                jobs.push(
                    async move {
                        let result = twilio.send_sms(phone, &body).await;
                        ChannelOutcome::from_result("sms", Some(phone.clone()), result)
                    }
                    .boxed(),
                );

                if let Some(from) = &self.whatsapp_from {
                    let body = sms_body.clone();
                    jobs.push(
                        async move {
                            let result = twilio.send_whatsapp(from, phone, &body).await;
                            ChannelOutcome::from_result("whatsapp", Some(phone.clone()), result)
                        }
                        .boxed(),
                    );
                }

                if let Some(doc) = twiml.clone() {
                    jobs.push(
                        async move {
                            let result = twilio.call(phone, &doc).await;
                            ChannelOutcome::from_result("call", Some(phone.clone()), result)
                        }
                        .boxed(),
                    );
                }
            }
        }

        if jobs.is_empty() {
            tracing::warn!(title = %alert.title, "no staff notification channel configured");
        }
        join_all(jobs).await
    }
}
