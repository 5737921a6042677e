//! Raw BatchData skip-trace shapes and the request body.

use leadfunnel_core::{format_phone, normalize_phone, Address, ContactRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SkipTraceRequest<'a> {
    pub requests: Vec<SkipTraceItem<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SkipTraceItem<'a> {
    pub property_address: PropertyAddress<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PropertyAddress<'a> {
    pub street: &'a str,
    pub city: &'a str,
    pub state: &'a str,
    pub zip: &'a str,
}

impl<'a> SkipTraceRequest<'a> {
    pub(crate) fn for_address(address: &'a Address) -> Self {
        Self {
            requests: vec![SkipTraceItem {
                property_address: PropertyAddress {
                    street: &address.street,
                    city: &address.city,
                    state: &address.state,
                    zip: address.zip5(),
                },
            }],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SkipTraceResponse {
    #[serde(default)]
    pub results: Option<SkipTraceResults>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SkipTraceResults {
    #[serde(default)]
    pub persons: Vec<Person>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Person {
    #[serde(default)]
    pub phone_numbers: Vec<PhoneEntry>,
    #[serde(default)]
    pub emails: Vec<EmailEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PhoneEntry {
    #[serde(default)]
    pub number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EmailEntry {
    #[serde(default)]
    pub email: Option<String>,
}

impl SkipTraceResponse {
    /// Flattens every person's phones and emails, normalized and
    /// de-duplicated in vendor order. `None` when nothing usable came back.
    pub(crate) fn into_record(self) -> Option<ContactRecord> {
        let persons = self.results.map(|r| r.persons).unwrap_or_default();
        let mut record = ContactRecord::default();

        for person in persons {
            for phone in person.phone_numbers.into_iter().filter_map(|p| p.number) {
                if normalize_phone(&phone).is_none() {
                    continue;
                }
                let formatted = format_phone(&phone);
                if !record.phone_numbers.contains(&formatted) {
                    record.phone_numbers.push(formatted);
                }
            }
            for email in person.emails.into_iter().filter_map(|e| e.email) {
                let email = email.trim().to_lowercase();
                if !email.is_empty() && !record.emails.contains(&email) {
                    record.emails.push(email);
                }
            }
        }

        (!record.is_empty()).then_some(record)
    }
}
