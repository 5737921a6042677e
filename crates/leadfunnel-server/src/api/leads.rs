//! Lead creation, reads, queued updates and the contact submission.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use leadfunnel_core::{
    Address, Attribution, ContactSubmission, FunnelStep, Lead, LeadId, ValidationError,
};
use leadfunnel_notify::LeadSummary;
use leadfunnel_tracking::{EventKind, TrackingEvent, UserData};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::middleware::RequestId;

use super::{
    client_ip, map_db_error, parse_lead_id, require_lead, user_agent, ApiError, ApiJson,
    ApiResponse, AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LeadCreated {
    lead_id: LeadId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LeadQueued {
    lead_id: LeadId,
    queued: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ContactAccepted {
    lead_id: LeadId,
    event_id: Option<String>,
}

/// Contact form body. Everything besides the contact fields is optional
/// context for tracking and the staff alert.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ContactRequest {
    #[serde(flatten)]
    contact: ContactSubmission,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    estimated_value: Option<i64>,
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    fbc: Option<String>,
    #[serde(default)]
    fbp: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
}

/// POST /api/leads
pub(super) async fn create_lead(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<Attribution>,
) -> Result<(StatusCode, Json<ApiResponse<LeadCreated>>), ApiError> {
    let lead = state
        .leads
        .create(body.to_fields())
        .await
        .map_err(|e| map_db_error(&req_id.0, &e))?;

    tracing::info!(lead_id = %lead.id, "lead created");
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(LeadCreated { lead_id: lead.id }),
    ))
}

/// GET /api/leads/{lead_id}
pub(super) async fn get_lead(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<Lead>>, ApiError> {
    let rid = &req_id.0;
    let lead_id = parse_lead_id(rid, &raw_id)?;

    let lead = require_lead(&state, rid, lead_id).await?;
    Ok(ApiResponse::ok(lead))
}

/// POST /api/leads/{lead_id}: sparse update, delivered in the background.
pub(super) async fn update_lead(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<ApiResponse<LeadQueued>>, ApiError> {
    let rid = &req_id.0;
    let lead_id = parse_lead_id(rid, &raw_id)?;

    let fields = match body {
        Value::Object(map) if !map.is_empty() => map,
        Value::Object(_) => {
            return Err(ApiError::new(
                rid,
                "validation_error",
                "update must contain at least one field",
            ))
        }
        _ => {
            return Err(ApiError::new(
                rid,
                "validation_error",
                "update must be a JSON object",
            ))
        }
    };
    if let Some(step) = fields.get(FunnelStep::FIELD) {
        if FunnelStep::from_value(step).is_none() {
            return Err(ApiError::new(
                rid,
                "validation_error",
                format!("unknown funnelStep {step}"),
            )
            .with_details(json!({ "field": FunnelStep::FIELD })));
        }
    }

    require_lead(&state, rid, lead_id).await?;
    state.submit_partial(lead_id, fields);
    Ok(ApiResponse::ok(LeadQueued {
        lead_id,
        queued: true,
    }))
}

/// POST /api/leads/{lead_id}/contact
///
/// Normalizes the contact, queues it onto the lead, fires the `Lead`
/// tracking event and alerts staff. Fails only on validation or an unknown
/// lead.
pub(super) async fn submit_contact(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<ContactRequest>,
) -> Result<Json<ApiResponse<ContactAccepted>>, ApiError> {
    let rid = &req_id.0;
    let lead_id = parse_lead_id(rid, &raw_id)?;
    let contact = body
        .contact
        .normalize()
        .map_err(|e| validation_error(rid, &e))?;
    let stored = require_lead(&state, rid, lead_id).await?;

    let now = state.clock.now();
    let mut fields = contact.to_fields();
    fields.insert(
        FunnelStep::FIELD.to_string(),
        Value::from(FunnelStep::Submitted.as_str()),
    );
    fields.insert("submittedAt".to_string(), Value::from(now.to_rfc3339()));
    state.submit_partial(lead_id, fields);

    let user = UserData {
        email: contact.email.clone(),
        phone: Some(contact.phone.clone()),
        first_name: Some(contact.first_name.clone()),
        last_name: Some(contact.last_name.clone()),
        client_ip: client_ip(&headers),
        user_agent: user_agent(&headers),
        fbc: body.fbc,
        fbp: body.fbp,
        client_id: body.client_id,
    };
    let mut event = TrackingEvent::new(
        EventKind::Lead {
            lead_id,
            value: None,
            currency: None,
        },
        now,
    )
    .with_user(user);
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

    let summary = LeadSummary {
        lead_id,
        name: contact.name,
        phone: contact.phone,
        email: contact.email,
        address: body
            .address
            .or_else(|| stored_address(&stored)),
        estimated_value: body
            .estimated_value
            .or_else(|| stored_estimate(&stored)),
    };
    let notifier = state.notifier.clone();
    tokio::spawn(async move {
        let outcomes = notifier.lead_submitted(&summary).await;
        let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
        tracing::info!(lead_id = %summary.lead_id, channels = outcomes.len(), failed, "staff alert finished");
    });

    tracing::info!(lead_id = %lead_id, "contact submitted");
    Ok(ApiResponse::ok(ContactAccepted { lead_id, event_id }))
}

fn validation_error(request_id: &str, error: &ValidationError) -> ApiError {
    let field = match error {
        ValidationError::Missing { field } | ValidationError::Invalid { field, .. } => *field,
    };
    ApiError::new(request_id, "validation_error", error.to_string())
        .with_details(json!({ "field": field }))
}

fn stored_address(lead: &Lead) -> Option<String> {
    let address = lead.fields.get("address")?;
    address
        .get("formattedAddress")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .or_else(|| {
            let parsed: Address = serde_json::from_value(address.clone()).ok()?;
            Some(parsed.one_line())
        })
}

fn stored_estimate(lead: &Lead) -> Option<i64> {
    lead.fields.get("apiEstimatedValue").and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use axum::Router;
    use leadfunnel_core::LeadFields;
    use leadfunnel_db::LeadStore;
    use leadfunnel_queue::PersistedState;
    use tower::ServiceExt;

    use crate::api::build_app;
    use crate::api::test_support::{harness, Harness};
    use crate::middleware::AuthState;

    use super::*;

    fn fields_of(value: Value) -> LeadFields {
        match value {
            Value::Object(map) => map,
            _ => LeadFields::new(),
        }
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, "funnel-test/1.0")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(req).await.expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn wait_for_field(h: &Harness, lead_id: LeadId, key: &str) -> Lead {
        for _ in 0..50 {
            let lead = h.store.get(lead_id).await.expect("get").expect("lead");
            if lead.fields.contains_key(key) {
                return lead;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("field {key} never reached lead {lead_id}");
    }

    #[tokio::test]
    async fn create_then_read_lead() {
        let h = harness(None);
        let app = build_app(h.state.clone(), AuthState::disabled());

        let (status, json) = call(
            app.clone(),
            post_json(
                "/api/leads",
                &json!({"campaignName": "spring", "utmSource": "facebook", "gclid": ""}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let lead_id = json["data"]["leadId"].as_str().expect("lead id").to_string();

        let (status, json) = call(
            app,
            Request::builder()
                .uri(format!("/api/leads/{lead_id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["fields"]["campaignName"], "spring");
        assert_eq!(json["data"]["fields"]["funnelStep"], "addressEntry");
        assert!(json["data"]["fields"].get("gclid").is_none());
    }

    #[tokio::test]
    async fn read_rejects_malformed_and_unknown_ids() {
        let h = harness(None);
        let app = build_app(h.state, AuthState::disabled());

        let (status, json) = call(
            app.clone(),
            Request::builder()
                .uri("/api/leads/not-a-uuid")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "validation_error");

        let (status, json) = call(
            app,
            Request::builder()
                .uri(format!("/api/leads/{}", LeadId::new()))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn update_must_be_an_object() {
        let h = harness(None);
        let app = build_app(h.state, AuthState::disabled());
        let (status, _) = call(
            app,
            post_json(&format!("/api/leads/{}", LeadId::new()), &json!(["phone"])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_rejects_unknown_funnel_step() {
        let h = harness(None);
        let lead = h
            .store
            .create(fields_of(json!({"funnelStep": "submitted"})))
            .await
            .expect("create");
        let app = build_app(h.state.clone(), AuthState::disabled());

        for step in [json!("bogus"), Value::Null, json!(3)] {
            let (status, json) = call(
                app.clone(),
                post_json(&format!("/api/leads/{}", lead.id), &json!({ "funnelStep": step })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["details"]["field"], "funnelStep");
        }

        assert!(h.pending.keys().await.expect("keys").is_empty());
        let stored = h.store.get(lead.id).await.expect("get").expect("lead");
        assert_eq!(stored.fields["funnelStep"], "submitted");
    }

    #[tokio::test]
    async fn update_for_unknown_lead_is_not_queued() {
        let h = harness(None);
        let app = build_app(h.state.clone(), AuthState::disabled());

        let (status, json) = call(
            app,
            post_json(&format!("/api/leads/{}", LeadId::new()), &json!({"bedrooms": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "not_found");
        assert_eq!(h.state.queue.in_flight(), 0);
        assert!(h.pending.keys().await.expect("keys").is_empty());
    }

    #[tokio::test]
    async fn update_is_delivered_in_background() {
        let h = harness(None);
        let lead = h
            .store
            .create(fields_of(json!({"funnelStep": "addressEntry"})))
            .await
            .expect("create");
        let app = build_app(h.state.clone(), AuthState::disabled());

        let (status, json) = call(
            app,
            post_json(
                &format!("/api/leads/{}", lead.id),
                &json!({"funnelStep": "contactCollection", "bedrooms": 3}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["queued"], true);

        let stored = wait_for_field(&h, lead.id, "bedrooms").await;
        assert_eq!(stored.fields["funnelStep"], "contactCollection");
    }

    #[tokio::test]
    async fn contact_with_bad_phone_is_rejected_with_field() {
        let h = harness(None);
        let app = build_app(h.state, AuthState::disabled());
        let (status, json) = call(
            app,
            post_json(
                &format!("/api/leads/{}/contact", LeadId::new()),
                &json!({"name": "Jane Doe", "phone": "555-1234"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "validation_error");
        assert_eq!(json["details"]["field"], "phone");
    }

    #[tokio::test]
    async fn contact_is_queued_and_tracked() {
        let h = harness(None);
        let lead = h
            .store
            .create(fields_of(json!({"funnelStep": "enrichment"})))
            .await
            .expect("create");
        let app = build_app(h.state.clone(), AuthState::disabled());

        let (status, json) = call(
            app,
            post_json(
                &format!("/api/leads/{}/contact", lead.id),
                &json!({
                    "name": "  Jane   Doe ",
                    "phone": "555.123.4567",
                    "email": "Jane@Example.com",
                    "eventId": "evt-1"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["eventId"], "evt-1");

        let stored = wait_for_field(&h, lead.id, "phone").await;
        assert_eq!(stored.fields["phone"], "(555) 123-4567");
        assert_eq!(stored.fields["name"], "Jane Doe");
        assert_eq!(stored.fields["email"], "jane@example.com");
        assert_eq!(stored.fields["funnelStep"], "submitted");

        let mut lead_events = Vec::new();
        for _ in 0..50 {
            lead_events = h
                .data_layer
                .snapshot()
                .into_iter()
                .filter(|e| e["event"] == "Lead")
                .collect();
            if !lead_events.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(lead_events.len(), 1);
        assert_eq!(lead_events[0]["eventId"], "evt-1");
    }

    #[tokio::test]
    async fn contact_for_unknown_lead_is_not_found() {
        let h = harness(None);
        let lead_id = LeadId::new();
        let app = build_app(h.state.clone(), AuthState::disabled());

        let (status, json) = call(
            app,
            post_json(
                &format!("/api/leads/{lead_id}/contact"),
                &json!({"name": "Jane Doe", "phone": "5551234567", "eventId": "evt-2"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);

        assert!(h.pending.keys().await.expect("keys").is_empty());
        assert!(h.data_layer.snapshot().is_empty());
    }

    #[test]
    fn stored_address_prefers_formatted_form() {
        let lead = Lead {
            id: LeadId::new(),
            fields: fields_of(json!({
                "address": {
                    "street": "123 Main St", "city": "Austin", "state": "TX", "zip": "78701",
                    "lat": 30.0, "lng": -97.0, "placeId": "p-1",
                    "formattedAddress": "123 Main St, Austin, TX 78701, USA"
                },
                "apiEstimatedValue": 350_000
            })),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert_eq!(
            stored_address(&lead).as_deref(),
            Some("123 Main St, Austin, TX 78701, USA")
        );
        assert_eq!(stored_estimate(&lead), Some(350_000));
    }
}
