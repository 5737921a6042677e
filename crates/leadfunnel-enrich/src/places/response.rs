//! Raw Google Places response shapes. Every field is optional; the
//! default-fill into [`Address`] happens in [`PlaceResult::into_address`].

use leadfunnel_core::{Address, AddressCandidate};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AutocompleteResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Prediction {
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Prediction {
    pub(crate) fn into_candidate(self) -> Option<AddressCandidate> {
        let place_id = self.place_id.filter(|s| !s.is_empty())?;
        let description = self.description.unwrap_or_default();
        Some(AddressCandidate {
            place_id,
            description,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DetailsResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<PlaceResult>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PlaceResult {
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub formatted_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AddressComponent {
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Geometry {
    #[serde(default)]
    pub location: Option<LatLng>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LatLng {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl PlaceResult {
    fn component(&self, kind: &str, short: bool) -> Option<String> {
        self.address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == kind))
            .and_then(|c| {
                if short {
                    c.short_name.clone().or_else(|| c.long_name.clone())
                } else {
                    c.long_name.clone().or_else(|| c.short_name.clone())
                }
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Builds an [`Address`], or returns the names of the components that
    /// were missing.
    pub(crate) fn into_address(self, place_id: &str) -> Result<Address, Vec<&'static str>> {
        let street_number = self.component("street_number", false);
        let route = self.component("route", true);
        let city = self
            .component("locality", false)
            .or_else(|| self.component("sublocality", false))
            .or_else(|| self.component("postal_town", false));
        let state = self.component("administrative_area_level_1", true);
        let zip = self.component("postal_code", false);

        let street = match (street_number, route) {
            (Some(n), Some(r)) => Some(format!("{n} {r}")),
            (None, Some(r)) => Some(r),
            _ => None,
        };

        let mut missing = Vec::new();
        if street.is_none() {
            missing.push("street");
        }
        if city.is_none() {
            missing.push("city");
        }
        if state.is_none() {
            missing.push("state");
        }
        if zip.is_none() {
            missing.push("zip");
        }
        if !missing.is_empty() {
            return Err(missing);
        }

        let location = self.geometry.and_then(|g| g.location).unwrap_or_default();
        Ok(Address {
            street: street.unwrap_or_default(),
            city: city.unwrap_or_default(),
            state: state.unwrap_or_default(),
            zip: zip.unwrap_or_default(),
            lat: location.lat.unwrap_or_default(),
            lng: location.lng.unwrap_or_default(),
            place_id: place_id.to_string(),
            formatted_address: self.formatted_address.unwrap_or_default(),
        })
    }
}
