//! Twilio callbacks. Both answer with TwiML rather than the JSON envelope.
//!
//! With `TWILIO_AUTH_TOKEN` configured every callback must carry a valid
//! `X-Twilio-Signature` and is answered 403 otherwise.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Form,
};
use leadfunnel_core::AppConfig;
use leadfunnel_notify::{twiml, verify_twilio_signature, NotifyError, SIGNATURE_HEADER};
use serde::Deserialize;

use super::AppState;

const DEFAULT_VOICE_MESSAGE: &str =
    "You have a new lead. Check your messages for the contact details.";

/// Longest `message` the voice webhook reads out.
const MAX_VOICE_MESSAGE_CHARS: usize = 500;

type Params = Vec<(String, String)>;

/// Signature check for inbound Twilio requests.
pub struct TwilioWebhookAuth {
    auth_token: String,
    public_url: Option<String>,
}

impl TwilioWebhookAuth {
    pub fn new(auth_token: impl Into<String>, public_url: Option<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            public_url,
        }
    }

    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let Some(token) = config.vendors.twilio_auth_token.as_deref() else {
            tracing::warn!("TWILIO_AUTH_TOKEN not set; Twilio webhooks are not authenticated");
            return None;
        };
        if config.public_url.is_none() {
            tracing::warn!("FUNNEL_PUBLIC_URL not set; Twilio signatures are checked against the Host header");
        }
        Some(Self::new(token, config.public_url.clone()))
    }

    /// The URL Twilio requested: the public origin (or `https://{Host}`)
    /// plus path and query.
    fn request_url(&self, headers: &HeaderMap, uri: &Uri) -> Option<String> {
        let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
        let origin = match &self.public_url {
            Some(url) => url.clone(),
            None => {
                let host = headers.get(header::HOST)?.to_str().ok()?;
                format!("https://{host}")
            }
        };
        Some(format!("{origin}{path}"))
    }

    fn verify(&self, headers: &HeaderMap, uri: &Uri, params: &[(String, String)]) -> bool {
        let Some(signature) = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        let Some(url) = self.request_url(headers, uri) else {
            return false;
        };
        verify_twilio_signature(&self.auth_token, &url, params, signature)
    }
}

fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    params: &[(String, String)],
) -> Result<(), Response> {
    let Some(auth) = &state.twilio_webhooks else {
        return Ok(());
    };
    if auth.verify(headers, uri, params) {
        Ok(())
    } else {
        tracing::warn!(path = %uri.path(), "rejected Twilio webhook with invalid signature");
        Err(StatusCode::FORBIDDEN.into_response())
    }
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

#[derive(Debug, Deserialize)]
pub(super) struct VoiceQuery {
    #[serde(default)]
    message: Option<String>,
}

/// POST /webhooks/twilio/status: message and call delivery updates.
pub(super) async fn twilio_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Form(params): Form<Params>,
) -> Response {
    if let Err(rejected) = authorize(&state, &headers, &uri, &params) {
        return rejected;
    }

    let sid = param(&params, "MessageSid")
        .or_else(|| param(&params, "CallSid"))
        .unwrap_or("");
    let status = param(&params, "MessageStatus")
        .or_else(|| param(&params, "CallStatus"))
        .unwrap_or("");

    match param(&params, "ErrorCode").filter(|c| !c.is_empty()) {
        Some(code) => tracing::warn!(sid, status, error_code = %code, "twilio delivery failed"),
        None => tracing::info!(sid, status, "twilio status callback"),
    }

    xml_response(twiml::empty())
}

/// GET /webhooks/twilio/voice: what a staff phone hears on pickup.
pub(super) async fn twilio_voice(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<VoiceQuery>,
) -> Response {
    voice_response(&state, &headers, &uri, &query, &[])
}

/// POST /webhooks/twilio/voice: same answer, with Twilio's call parameters
/// in the form body.
pub(super) async fn twilio_voice_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<VoiceQuery>,
    Form(params): Form<Params>,
) -> Response {
    voice_response(&state, &headers, &uri, &query, &params)
}

fn voice_response(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    query: &VoiceQuery,
    params: &[(String, String)],
) -> Response {
    if let Err(rejected) = authorize(state, headers, uri, params) {
        return rejected;
    }

    let message = query
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_VOICE_MESSAGE);
    if message.chars().count() > MAX_VOICE_MESSAGE_CHARS {
        tracing::warn!(chars = message.chars().count(), "voice message too long");
        return StatusCode::BAD_REQUEST.into_response();
    }
    xml_response(twiml::say(message))
}

fn xml_response(document: Result<String, NotifyError>) -> Response {
    match document {
        Ok(body) => ([(header::CONTENT_TYPE, "text/xml")], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render TwiML");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
