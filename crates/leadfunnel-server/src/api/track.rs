use axum::{extract::State, http::HeaderMap, Json};
use leadfunnel_tracking::{EventKind, TrackingEvent, UserData};
use serde::{Deserialize, Serialize};

use super::{client_ip, user_agent, ApiJson, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TrackRequest {
    #[serde(flatten)]
    kind: EventKind,
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    user: UserData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TrackResponse {
    /// `false` when the event was suppressed as a duplicate.
    tracked: bool,
    event_id: Option<String>,
}

/// POST /api/track
pub(super) async fn track_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<TrackRequest>,
) -> Json<ApiResponse<TrackResponse>> {
    let mut user = body.user;
    if user.client_ip.is_none() {
        user.client_ip = client_ip(&headers);
    }
    if user.user_agent.is_none() {
        user.user_agent = user_agent(&headers);
    }

    let mut event = TrackingEvent::new(body.kind, state.clock.now()).with_user(user);
    if let Some(event_id) = body.event_id {
        event = event.with_event_id(event_id);
    }
    if let Some(url) = body.source_url {
        event = event.with_source_url(url);
    }

    let event_id = state
        .tracking
        .track(event)
        .map(|handle| handle.event_id().to_string());
    ApiResponse::ok(TrackResponse {
        tracked: event_id.is_some(),
        event_id,
    })
}
