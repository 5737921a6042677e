use axum::{extract::State, Extension, Json};
use leadfunnel_notify::{ChannelOutcome, StaffAlert};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{configuration_error, ApiError, ApiJson, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct NotifyResponse {
    sent: usize,
    channels: Vec<ChannelOutcome>,
}

/// POST /api/notify: staff-only, behind bearer auth.
pub(super) async fn notify_staff(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(alert): ApiJson<StaffAlert>,
) -> Result<Json<ApiResponse<NotifyResponse>>, ApiError> {
    let rid = &req_id.0;
    if alert.title.trim().is_empty() || alert.message.trim().is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "title and message are required",
        ));
    }
    if !state.notifier.is_configured() {
        return Err(configuration_error(
            rid,
            "no Pushover or Twilio credentials configured",
        ));
    }

    let channels = state.notifier.send(&alert).await;
    let sent = channels.iter().filter(|c| c.succeeded()).count();
    if sent == 0 {
        return Err(
            ApiError::new(rid, "internal_error", "every notification channel failed")
                .with_details(serde_json::to_value(&channels).unwrap_or_default()),
        );
    }

    Ok(ApiResponse::ok(NotifyResponse { sent, channels }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::api::build_app;
    use crate::api::test_support::harness;
    use crate::middleware::AuthState;

    fn notify_request(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/notify")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
            .body(Body::from(
                json!({"title": "Test", "message": "hello"}).to_string(),
            ))
            .expect("request")
    }

    #[tokio::test]
    async fn notify_requires_bearer_token() {
        let h = harness(None);
        let auth = AuthState::from_raw("staff-key", false).expect("auth");
        let app = build_app(h.state, auth);

        let response = app
            .clone()
            .oneshot(notify_request(None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(notify_request(Some("wrong")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn notify_without_channels_is_configuration_error() {
        let h = harness(None);
        let auth = AuthState::from_raw("staff-key", false).expect("auth");
        let app = build_app(h.state, auth);

        let response = app
            .oneshot(notify_request(Some("staff-key")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
