//! Address autocomplete and place resolution.

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use leadfunnel_core::{Address, AddressCandidate};
use leadfunnel_enrich::PlacesClient;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{configuration_error, map_resolution_error, ApiError, ApiJson, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct SuggestRequest {
    #[serde(default)]
    input: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ResolveRequest {
    #[serde(default)]
    place_id: String,
}

pub(super) fn require_places(state: &AppState, request_id: &str) -> Result<Arc<PlacesClient>, ApiError> {
    state
        .places
        .clone()
        .ok_or_else(|| configuration_error(request_id, "GOOGLE_PLACES_API_KEY is not set"))
}

/// POST /api/address/suggest
pub(super) async fn suggest(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<SuggestRequest>,
) -> Result<Json<ApiResponse<Vec<AddressCandidate>>>, ApiError> {
    let places = require_places(&state, &req_id.0)?;
    Ok(ApiResponse::ok(places.suggest(&body.input).await))
}

/// POST /api/address/resolve
pub(super) async fn resolve(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<ResolveRequest>,
) -> Result<Json<ApiResponse<Address>>, ApiError> {
    let rid = &req_id.0;
    let places = require_places(&state, rid)?;

    let place_id = body.place_id.trim();
    if place_id.is_empty() {
        return Err(ApiError::new(rid, "validation_error", "placeId is required"));
    }

    let address = places
        .resolve(place_id)
        .await
        .map_err(|e| map_resolution_error(rid, &e))?;
    Ok(ApiResponse::ok(address))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::api::build_app;
    use crate::api::test_support::harness;
    use crate::middleware::AuthState;

    use super::*;

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn read_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    #[tokio::test]
    async fn suggest_without_places_key_is_configuration_error() {
        let h = harness(None);
        let app = build_app(h.state, AuthState::disabled());
        let response = app
            .oneshot(post_json("/api/address/suggest", &json!({"input": "123 Main"})))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "configuration_error");
        assert!(!json["error"].as_str().unwrap_or_default().contains("GOOGLE"));
    }

    #[tokio::test]
    async fn suggest_returns_vendor_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/autocomplete/json"))
            .and(query_param("input", "123 Main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "predictions": [
                    { "place_id": "p-1", "description": "123 Main St, Austin, TX, USA" }
                ]
            })))
            .mount(&server)
            .await;

        let places = PlacesClient::with_base_url("test-key", 5, &server.uri()).expect("client");
        let h = harness(Some(places));
        let app = build_app(h.state, AuthState::disabled());
        let response = app
            .oneshot(post_json("/api/address/suggest", &json!({"input": "123 Main"})))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["data"][0]["placeId"], "p-1");
    }

    #[tokio::test]
    async fn resolve_unknown_place_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/details/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "NOT_FOUND"
            })))
            .mount(&server)
            .await;

        let places = PlacesClient::with_base_url("test-key", 5, &server.uri()).expect("client");
        let h = harness(Some(places));
        let app = build_app(h.state, AuthState::disabled());
        let response = app
            .oneshot(post_json("/api/address/resolve", &json!({"placeId": "missing"})))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(response).await["code"], "not_found");
    }

    #[tokio::test]
    async fn resolve_requires_place_id() {
        let places = PlacesClient::with_base_url("test-key", 5, "http://127.0.0.1:9").expect("client");
        let h = harness(Some(places));
        let app = build_app(h.state, AuthState::disabled());
        let response = app
            .oneshot(post_json("/api/address/resolve", &json!({"placeId": "  "})))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
