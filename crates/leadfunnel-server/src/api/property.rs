use axum::{extract::State, Extension, Json};
use leadfunnel_core::{Address, AggregatedResult, FunnelStep, LeadFields, LeadId};
use serde::Deserialize;
use serde_json::Value;

use crate::middleware::RequestId;

use super::address::require_places;
use super::{map_resolution_error, require_lead, ApiError, ApiJson, ApiResponse, AppState};

/// Either a resolved address or a place id to resolve first. When `leadId`
/// is set the enrichment result is queued onto that lead.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PropertyLookupRequest {
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    lead_id: Option<LeadId>,
}

/// POST /api/property-lookup
pub(super) async fn lookup(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<PropertyLookupRequest>,
) -> Result<Json<ApiResponse<AggregatedResult>>, ApiError> {
    let rid = &req_id.0;
    if let Some(lead_id) = body.lead_id {
        require_lead(&state, rid, lead_id).await?;
    }

    let result = match (body.address, body.place_id.as_deref().map(str::trim)) {
        (Some(address), _) => state.aggregator.lookup_property(&address).await,
        (None, Some(place_id)) if !place_id.is_empty() => {
            let places = require_places(&state, rid)?;
            state
                .aggregator
                .lookup_place(&places, place_id)
                .await
                .map_err(|e| map_resolution_error(rid, &e))?
        }
        _ => {
            return Err(ApiError::new(
                rid,
                "validation_error",
                "address or placeId is required",
            ))
        }
    };

    if let Some(lead_id) = body.lead_id {
        state.submit_partial(lead_id, enrichment_fields(&result));
    }

    Ok(ApiResponse::ok(result))
}

/// Lead fields recorded once a property has been enriched.
fn enrichment_fields(result: &AggregatedResult) -> LeadFields {
    let mut fields = match serde_json::to_value(result) {
        Ok(Value::Object(map)) => map,
        _ => LeadFields::new(),
    };
    fields.insert(
        FunnelStep::FIELD.to_string(),
        Value::from(FunnelStep::Enrichment.as_str()),
    );
    fields
}
