//! Enrichment records and the merged lookup result returned to the funnel.

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Property valuation data. Every field has a zero/empty default so a
/// no-match renders without special cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub estimated_value: i64,
    pub max_value: i64,
    pub equity: i64,
    pub equity_percentage: i64,
    pub owner_name: String,
    pub bedrooms: u32,
    pub bathrooms: f64,
    pub square_footage: u32,
}

impl PropertyRecord {
    /// Enforces the valuation invariant: a record without a positive
    /// estimate carries no equity, otherwise equity lies in
    /// `0..=estimated_value` and the percentage is derived from it.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.estimated_value <= 0 {
            self.estimated_value = 0;
            self.equity = 0;
            self.equity_percentage = 0;
        } else {
            self.equity = self.equity.clamp(0, self.estimated_value);
            self.equity_percentage = equity_percentage(self.equity, self.estimated_value);
        }
        self.max_value = self.max_value.max(0);
        self
    }
}

/// Skip-trace contact data; empty vectors on no-match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub phone_numbers: Vec<String>,
    pub emails: Vec<String>,
}

impl ContactRecord {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phone_numbers.is_empty() && self.emails.is_empty()
    }
}

/// Which vendors actually contributed to an [`AggregatedResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSources {
    pub melissa: bool,
    pub batch_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub address: Address,
    pub api_estimated_value: i64,
    pub formatted_api_estimated_value: String,
    pub api_max_value: i64,
    pub formatted_api_max_value: String,
    pub api_equity: i64,
    pub api_percentage: i64,
    pub api_owner_name: String,
    pub bedrooms: u32,
    pub bathrooms: f64,
    pub square_footage: u32,
    pub phone_numbers: Vec<String>,
    pub emails: Vec<String>,
    pub property_data_sources: DataSources,
}

impl AggregatedResult {
    /// Merges the outcome of both sub-lookups. A `None` side falls back to
    /// the zero-value record and clears its provenance flag.
    #[must_use]
    pub fn merge(
        address: Address,
        property: Option<PropertyRecord>,
        contact: Option<ContactRecord>,
    ) -> Self {
        let sources = DataSources {
            melissa: property.is_some(),
            batch_data: contact.is_some(),
        };
        let property = property.unwrap_or_default().normalized();
        let contact = contact.unwrap_or_default();

        Self {
            address,
            api_estimated_value: property.estimated_value,
            formatted_api_estimated_value: format_usd(property.estimated_value),
            api_max_value: property.max_value,
            formatted_api_max_value: format_usd(property.max_value),
            api_equity: property.equity,
            api_percentage: property.equity_percentage,
            api_owner_name: property.owner_name,
            bedrooms: property.bedrooms,
            bathrooms: property.bathrooms,
            square_footage: property.square_footage,
            phone_numbers: contact.phone_numbers,
            emails: contact.emails,
            property_data_sources: sources,
        }
    }
}

/// `round(equity / estimated * 100)`, or 0 when there is no estimate.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn equity_percentage(equity: i64, estimated_value: i64) -> i64 {
    if estimated_value <= 0 {
        return 0;
    }
    ((equity as f64 / estimated_value as f64) * 100.0).round() as i64
}

/// Whole-dollar US currency with thousands separators: `$350,000`.
#[must_use]
pub fn format_usd(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}
