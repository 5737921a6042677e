use serde::{Deserialize, Serialize};

/// A normalized US street address with coordinates.
///
/// Only the address resolver builds these from vendor data; everything
/// downstream consumes the structured fields and never re-parses free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub lat: f64,
    pub lng: f64,
    pub place_id: String,
    #[serde(default)]
    pub formatted_address: String,
}

impl Address {
    /// Single-line form used for vendor freeform lookups.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!("{}, {}, {} {}", self.street, self.city, self.state, self.zip)
            .trim()
            .to_string()
    }

    /// Cache key: the single-line form, trimmed and lowercased.
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.one_line().trim().to_lowercase()
    }

    /// Five-digit ZIP, dropping any `+4` suffix.
    #[must_use]
    pub fn zip5(&self) -> &str {
        self.zip.split('-').next().unwrap_or(&self.zip)
    }
}

/// One autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressCandidate {
    pub place_id: String,
    pub description: String,
}
