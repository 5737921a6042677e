//! Normalization of visitor-submitted contact fields.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lead::LeadFields;
use crate::ValidationError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Reduces a US phone number to its ten national digits.
///
/// Accepts any punctuation and an optional leading country code `1`.
/// Returns `None` when the remaining digits are not exactly ten.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let national = match digits.len() {
        10 => digits,
        11 if digits.starts_with('1') => digits[1..].to_string(),
        _ => return None,
    };
    Some(national)
}

/// Display form `(555) 123-4567`. Falls back to the input when it is not a
/// valid US number.
#[must_use]
pub fn format_phone(raw: &str) -> String {
    match normalize_phone(raw) {
        Some(d) => format!("({}) {}-{}", &d[..3], &d[3..6], &d[6..]),
        None => raw.trim().to_string(),
    }
}

/// E.164 form `+15551234567`, as telephony vendors expect.
#[must_use]
pub fn to_e164(raw: &str) -> Option<String> {
    if raw.trim_start().starts_with('+') && !raw.trim_start().starts_with("+1") {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        return (!digits.is_empty()).then(|| format!("+{digits}"));
    }
    normalize_phone(raw).map(|d| format!("+1{d}"))
}

/// Splits a full name into first and last; everything after the first
/// whitespace-separated token is the last name.
#[must_use]
pub fn split_name(full: &str) -> (String, String) {
    let mut parts = full.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Raw contact form input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedContact {
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl ContactSubmission {
    /// Validates and normalizes the submission.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Missing`] for an empty name or phone and
    /// [`ValidationError::Invalid`] for a phone that is not a US number or a
    /// malformed email.
    pub fn normalize(&self) -> Result<NormalizedContact, ValidationError> {
        let name = self.name.split_whitespace().collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            return Err(ValidationError::Missing { field: "name" });
        }
        if self.phone.trim().is_empty() {
            return Err(ValidationError::Missing { field: "phone" });
        }
        if normalize_phone(&self.phone).is_none() {
            return Err(ValidationError::Invalid {
                field: "phone",
                reason: "expected a 10-digit US phone number".to_string(),
            });
        }

        let email = match self.email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(e) if EMAIL_RE.is_match(e) => Some(e.to_lowercase()),
            Some(_) => {
                return Err(ValidationError::Invalid {
                    field: "email",
                    reason: "not a valid email address".to_string(),
                })
            }
        };

        let (first_name, last_name) = split_name(&name);
        Ok(NormalizedContact {
            phone: format_phone(&self.phone),
            name,
            first_name,
            last_name,
            email,
        })
    }
}

impl NormalizedContact {
    /// Lead document fields for this contact.
    #[must_use]
    pub fn to_fields(&self) -> LeadFields {
        let mut fields = LeadFields::new();
        fields.insert("name".to_string(), Value::from(self.name.clone()));
        fields.insert("firstName".to_string(), Value::from(self.first_name.clone()));
        fields.insert("lastName".to_string(), Value::from(self.last_name.clone()));
        fields.insert("phone".to_string(), Value::from(self.phone.clone()));
        if let Some(email) = &self.email {
            fields.insert("email".to_string(), Value::from(email.clone()));
        }
        fields
    }
}
