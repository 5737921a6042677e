pub mod address;
pub mod app_config;
pub mod clock;
pub mod config;
pub mod contact;
pub mod lead;
pub mod property;

use thiserror::Error;

pub use address::{Address, AddressCandidate};
pub use app_config::{AppConfig, Environment, VendorKeys};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_app_config, load_app_config_from_env};
pub use contact::{
    format_phone, normalize_phone, split_name, to_e164, ContactSubmission, NormalizedContact,
};
pub use lead::{merge_fields, Attribution, FunnelStep, Lead, LeadFields, LeadId};
pub use property::{
    equity_percentage, format_usd, AggregatedResult, ContactRecord, DataSources, PropertyRecord,
};

/// Every variable is optional; only malformed values fail.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Validation failures for user-submitted fields.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}
