//! `lookup` and `suggest`: the funnel's address step, run by hand.

use std::sync::Arc;

use leadfunnel_core::{AddressCandidate, AggregatedResult, AppConfig, SystemClock};
use leadfunnel_enrich::{LookupAggregator, PlacesClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LookupTarget {
    Address(String),
    PlaceId(String),
}

fn places(config: &AppConfig) -> anyhow::Result<PlacesClient> {
    PlacesClient::from_config(config)?
        .ok_or_else(|| anyhow::anyhow!("GOOGLE_PLACES_API_KEY must be set for address lookups"))
}

/// Resolves `target` and prints the aggregated enrichment.
///
/// # Errors
///
/// Returns an error if Places is not configured, the address has no
/// suggestion, or the place cannot be resolved.
pub(crate) async fn run_lookup(
    config: &AppConfig,
    target: LookupTarget,
    as_json: bool,
) -> anyhow::Result<()> {
    let places = places(config)?;
    let aggregator = LookupAggregator::from_config(config, Arc::new(SystemClock))?;

    let place_id = match target {
        LookupTarget::PlaceId(id) => id,
        LookupTarget::Address(input) => {
            let candidate = first_candidate(places.suggest(&input).await, &input)?;
            tracing::info!(place_id = %candidate.place_id, description = %candidate.description, "using first suggestion");
            candidate.place_id
        }
    };

    let result = aggregator.lookup_place(&places, &place_id).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in summary_lines(&result) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Prints autocomplete candidates, one per line.
///
/// # Errors
///
/// Returns an error if Places is not configured.
pub(crate) async fn run_suggest(config: &AppConfig, input: &str) -> anyhow::Result<()> {
    let places = places(config)?;
    let candidates = places.suggest(input).await;
    if candidates.is_empty() {
        println!("no suggestions for '{input}'");
    }
    for candidate in candidates {
        println!("{}\t{}", candidate.place_id, candidate.description);
    }
    Ok(())
}

fn first_candidate(
    candidates: Vec<AddressCandidate>,
    input: &str,
) -> anyhow::Result<AddressCandidate> {
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no address matches '{input}'"))
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub(crate) fn summary_lines(result: &AggregatedResult) -> Vec<String> {
    let mut lines = vec![
        format!("Address:         {}", result.address.one_line()),
        format!("Estimated value: {}", result.formatted_api_estimated_value),
        format!("Max value:       {}", result.formatted_api_max_value),
        format!(
            "Equity:          {} ({}%)",
            leadfunnel_core::format_usd(result.api_equity),
            result.api_percentage
        ),
    ];
    if !result.api_owner_name.is_empty() {
        lines.push(format!("Owner:           {}", result.api_owner_name));
    }
    lines.push(format!(
        "Beds/baths/sqft: {} / {} / {}",
        result.bedrooms, result.bathrooms, result.square_footage
    ));
    for phone in &result.phone_numbers {
        lines.push(format!("Phone:           {phone}"));
    }
    for email in &result.emails {
        lines.push(format!("Email:           {email}"));
    }
    lines.push(format!(
        "Sources:         melissa={} batchdata={}",
        yes_no(result.property_data_sources.melissa),
        yes_no(result.property_data_sources.batch_data)
    ));
    lines
}
