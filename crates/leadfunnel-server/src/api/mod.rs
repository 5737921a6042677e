mod address;
mod leads;
mod notify;
mod property;
mod track;
mod webhooks;

pub use webhooks::TwilioWebhookAuth;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use leadfunnel_core::{Clock, Lead, LeadFields, LeadId};
use leadfunnel_db::{DbError, LeadStore};
use leadfunnel_enrich::{LookupAggregator, PlacesClient, ResolutionError};
use leadfunnel_notify::StaffNotifier;
use leadfunnel_queue::{SubmissionEnvelope, SubmissionQueue};
use leadfunnel_tracking::TrackingDispatcher;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, require_bearer_auth, AuthState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub leads: Arc<dyn LeadStore>,
    pub queue: SubmissionQueue,
    /// `None` when `GOOGLE_PLACES_API_KEY` is unset.
    pub places: Option<Arc<PlacesClient>>,
    pub aggregator: Arc<LookupAggregator>,
    pub tracking: Arc<TrackingDispatcher>,
    pub notifier: Arc<StaffNotifier>,
    pub clock: Arc<dyn Clock>,
    /// Present only for the Postgres-backed store; used by the health check.
    pub pool: Option<PgPool>,
    /// `None` leaves Twilio webhooks unauthenticated.
    pub twilio_webhooks: Option<Arc<TwilioWebhookAuth>>,
}

impl AppState {
    /// Hands a partial lead update to the background queue.
    pub(crate) fn submit_partial(&self, lead_id: LeadId, fields: LeadFields) {
        let envelope = SubmissionEnvelope::for_lead(lead_id, fields, self.clock.now());
        let _handle = self.queue.submit(envelope);
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub request_id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    store: &'static str,
    database: &'static str,
    in_flight: usize,
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: message.into(),
            code: code.into(),
            details: None,
            request_id: request_id.into(),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// JSON body extractor whose rejections use the API error envelope.
pub(crate) struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(&request_id, &rejection)),
        }
    }
}

fn json_rejection(request_id: &str, rejection: &JsonRejection) -> ApiError {
    tracing::debug!(status = %rejection.status(), error = %rejection.body_text(), "rejected request body");
    ApiError::new(request_id, "validation_error", rejection.body_text())
}

/// 404 unless `lead_id` names a stored lead.
pub(super) async fn require_lead(
    state: &AppState,
    request_id: &str,
    lead_id: LeadId,
) -> Result<Lead, ApiError> {
    state
        .leads
        .get(lead_id)
        .await
        .map_err(|e| map_db_error(request_id, &e))?
        .ok_or_else(|| ApiError::new(request_id, "not_found", format!("lead {lead_id} not found")))
}

pub(super) fn map_db_error(request_id: &str, error: &DbError) -> ApiError {
    tracing::error!(error = %error, "lead store operation failed");
    ApiError::new(request_id, "internal_error", "lead store operation failed")
}

/// Logs the missing setting and returns a generic 500.
pub(super) fn configuration_error(request_id: &str, detail: &str) -> ApiError {
    tracing::error!(detail, "endpoint called without required configuration");
    ApiError::new(request_id, "configuration_error", "service is not configured")
}

pub(super) fn map_resolution_error(request_id: &str, error: &ResolutionError) -> ApiError {
    match error {
        ResolutionError::NotFound { place_id } => ApiError::new(
            request_id,
            "not_found",
            format!("no address found for place {place_id}"),
        ),
        ResolutionError::Incomplete { missing, .. } => {
            ApiError::new(request_id, "validation_error", "address is incomplete")
                .with_details(serde_json::json!({ "missing": missing }))
        }
        ResolutionError::Vendor { .. } | ResolutionError::Enrich(_) => {
            tracing::error!(error = %error, "address resolution failed");
            ApiError::new(request_id, "internal_error", "address resolution failed")
        }
    }
}

pub(super) fn parse_lead_id(request_id: &str, raw: &str) -> Result<LeadId, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::new(
            request_id,
            "validation_error",
            format!("'{raw}' is not a valid lead id"),
        )
    })
}

/// First hop of `x-forwarded-for`, if the request came through a proxy.
pub(super) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

pub(super) fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/api/notify", post(notify::notify_staff))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/address/suggest", post(address::suggest))
        .route("/api/address/resolve", post(address::resolve))
        .route("/api/property-lookup", post(property::lookup))
        .route("/api/leads", post(leads::create_lead))
        .route(
            "/api/leads/{lead_id}",
            get(leads::get_lead).post(leads::update_lead),
        )
        .route("/api/leads/{lead_id}/contact", post(leads::submit_contact))
        .route("/api/track", post(track::track_event))
        .route("/webhooks/twilio/status", post(webhooks::twilio_status))
        .route(
            "/webhooks/twilio/voice",
            get(webhooks::twilio_voice).post(webhooks::twilio_voice_form),
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let in_flight = state.queue.in_flight();
    let Some(pool) = &state.pool else {
        return (
            StatusCode::OK,
            ApiResponse::ok(HealthData {
                status: "ok",
                store: "memory",
                database: "none",
                in_flight,
            }),
        );
    };

    match leadfunnel_db::health_check(pool).await {
        Ok(()) => (
            StatusCode::OK,
            ApiResponse::ok(HealthData {
                status: "ok",
                store: "postgres",
                database: "ok",
                in_flight,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiResponse::ok(HealthData {
                    status: "degraded",
                    store: "postgres",
                    database: "unavailable",
                    in_flight,
                }),
            )
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::harness;
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(req).await.expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_error_configuration_error_maps_to_internal_error() {
        let response = configuration_error("req-1", "GOOGLE_PLACES_API_KEY").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn client_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.7, 10.0.0.1".parse().expect("header"),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn health_reports_memory_store() {
        let h = harness(None);
        let app = build_app(h.state, AuthState::disabled());
        let (status, json) = call(
            app,
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["store"], "memory");
    }

    #[tokio::test]
    async fn response_echoes_request_id() {
        let h = harness(None);
        let app = build_app(h.state, AuthState::disabled());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("x-request-id", "req-abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(
            response.headers().get("x-request-id").map(|v| v.as_bytes()),
            Some(&b"req-abc"[..])
        );
    }

    #[tokio::test]
    async fn preflight_is_answered() {
        let h = harness(None);
        let app = build_app(h.state, AuthState::disabled());
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/leads")
                    .header(header::ORIGIN, "https://funnel.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn malformed_json_body_uses_error_envelope() {
        let h = harness(None);
        let app = build_app(h.state, AuthState::disabled());

        let (status, json) = call(
            app.clone(),
            Request::builder()
                .method(Method::POST)
                .uri("/api/track")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-request-id", "req-bad-body")
                .body(Body::from(r#"{"event":"lead"}"#))
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "validation_error");
        assert_eq!(json["requestId"], "req-bad-body");

        let (status, json) = call(
            app.clone(),
            Request::builder()
                .method(Method::POST)
                .uri("/api/leads")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let (status, json) = call(
            app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/address/suggest")
                .body(Body::from(r#"{"input":"123 Main"}"#))
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "validation_error");
    }

    #[tokio::test]
    async fn wrong_method_is_rejected() {
        let h = harness(None);
        let app = build_app(h.state, AuthState::disabled());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/track")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
