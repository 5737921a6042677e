//! Raw Melissa `LookupProperty` response shapes.
//!
//! Melissa reports numbers as strings and omits whole groups when it has no
//! data, so every field is an optional `Value` read through the lenient
//! helpers.

use leadfunnel_core::PropertyRecord;
use serde::Deserialize;
use serde_json::Value;

use crate::lenient::{as_f64, as_i64, as_text, as_u32};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LookupResponse {
    #[serde(default)]
    pub transmission_results: Option<String>,
    #[serde(default)]
    pub records: Vec<PropertyRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PropertyRow {
    #[serde(default)]
    pub results: Option<String>,
    #[serde(default)]
    pub primary_owner: Option<Owner>,
    #[serde(default)]
    pub estimated_value: Option<Valuation>,
    #[serde(default)]
    pub int_room_info: Option<RoomInfo>,
    #[serde(default)]
    pub property_size: Option<PropertySize>,
    #[serde(default)]
    pub current_deed: Option<Deed>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Owner {
    #[serde(default)]
    pub name1_full: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Valuation {
    #[serde(default)]
    pub estimated_value: Option<Value>,
    #[serde(default)]
    pub estimated_max_value: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RoomInfo {
    #[serde(default)]
    pub bedrooms_count: Option<Value>,
    #[serde(default)]
    pub bath_count: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PropertySize {
    #[serde(default)]
    pub area_building: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Deed {
    #[serde(default)]
    pub mortgage_amount: Option<Value>,
    #[serde(default)]
    pub second_mortgage_amount: Option<Value>,
}

impl PropertyRow {
    /// Melissa flags a failed match with `YE**` result codes.
    pub(crate) fn is_match(&self) -> bool {
        let codes = self.results.as_deref().unwrap_or_default();
        !codes.split(',').any(|c| c.trim().starts_with("YE"))
    }

    /// Default-fill into a [`PropertyRecord`]; missing values become zero.
    pub(crate) fn into_record(self) -> PropertyRecord {
        let valuation = self.estimated_value.unwrap_or_default();
        let rooms = self.int_room_info.unwrap_or_default();
        let size = self.property_size.unwrap_or_default();
        let deed = self.current_deed.unwrap_or_default();

        let estimated_value = as_i64(valuation.estimated_value.as_ref()).unwrap_or(0);
        let max_value = as_i64(valuation.estimated_max_value.as_ref()).unwrap_or(estimated_value);
        let loans = [&deed.mortgage_amount, &deed.second_mortgage_amount]
            .into_iter()
            .filter_map(|amount| as_i64(amount.as_ref()))
            .map(|amount| amount.max(0))
            .fold(0i64, i64::saturating_add);

        PropertyRecord {
            estimated_value,
            max_value,
            equity: estimated_value.saturating_sub(loans).max(0),
            equity_percentage: 0,
            owner_name: self
                .primary_owner
                .and_then(|o| as_text(o.name1_full.as_ref()))
                .unwrap_or_default(),
            bedrooms: as_u32(rooms.bedrooms_count.as_ref()).unwrap_or(0),
            bathrooms: as_f64(rooms.bath_count.as_ref()).unwrap_or(0.0).max(0.0),
            square_footage: as_u32(size.area_building.as_ref()).unwrap_or(0),
        }
        .normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fills_record_from_string_fields() {
        let row: PropertyRow = serde_json::from_value(json!({
            "Results": "YS01,YS02",
            "PrimaryOwner": { "Name1Full": "DOE JANE" },
            "EstimatedValue": { "EstimatedValue": "400000", "EstimatedMaxValue": "440000" },
            "IntRoomInfo": { "BedroomsCount": "4", "BathCount": "2.5" },
            "PropertySize": { "AreaBuilding": "2,100" },
            "CurrentDeed": { "MortgageAmount": "150000", "SecondMortgageAmount": "" }
        }))
        .unwrap();
        assert!(row.is_match());
        let record = row.into_record();
        assert_eq!(record.estimated_value, 400_000);
        assert_eq!(record.max_value, 440_000);
        assert_eq!(record.equity, 250_000);
        assert_eq!(record.equity_percentage, 63);
        assert_eq!(record.owner_name, "DOE JANE");
        assert_eq!(record.bedrooms, 4);
        assert!((record.bathrooms - 2.5).abs() < f64::EPSILON);
        assert_eq!(record.square_footage, 2_100);
    }

    #[test]
    fn empty_row_defaults_to_zero() {
        let record = PropertyRow::default().into_record();
        assert_eq!(record, PropertyRecord::default());
    }

    #[test]
    fn underwater_property_has_zero_equity() {
        let row: PropertyRow = serde_json::from_value(json!({
            "EstimatedValue": { "EstimatedValue": "200000" },
            "CurrentDeed": { "MortgageAmount": "260000" }
        }))
        .unwrap();
        let record = row.into_record();
        assert_eq!(record.equity, 0);
        assert_eq!(record.equity_percentage, 0);
    }

    #[test]
    fn huge_mortgage_amounts_do_not_overflow() {
        let row: PropertyRow = serde_json::from_value(json!({
            "EstimatedValue": { "EstimatedValue": "300000" },
            "CurrentDeed": { "MortgageAmount": "1e300", "SecondMortgageAmount": "1e300" }
        }))
        .unwrap();
        let record = row.into_record();
        assert_eq!(record.estimated_value, 300_000);
        assert_eq!(record.equity, 0);
        assert_eq!(record.equity_percentage, 0);

        let row: PropertyRow = serde_json::from_value(json!({
            "EstimatedValue": { "EstimatedValue": "-1e300" },
            "CurrentDeed": { "MortgageAmount": "-1e300" }
        }))
        .unwrap();
        assert_eq!(row.into_record(), PropertyRecord::default());
    }

    #[test]
    fn error_result_codes_are_not_a_match() {
        let row = PropertyRow {
            results: Some("YE01".to_string()),
            ..PropertyRow::default()
        };
        assert!(!row.is_match());
    }
}
