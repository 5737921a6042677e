use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Credentials for one vendor integration. `None` fields disable the
/// integration rather than failing startup.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct VendorKeys {
    pub google_places_api_key: Option<String>,
    pub melissa_license_key: Option<String>,
    pub batchdata_api_key: Option<String>,
    pub facebook_pixel_id: Option<String>,
    pub facebook_access_token: Option<String>,
    pub ga4_measurement_id: Option<String>,
    pub ga4_api_secret: Option<String>,
    pub pushover_app_token: Option<String>,
    pub pushover_user_key: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
    /// Sender for WhatsApp staff alerts; WhatsApp is skipped when unset.
    pub twilio_whatsapp_from: Option<String>,
}

fn redact(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "[redacted]")
}

impl std::fmt::Debug for VendorKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorKeys")
            .field(
                "google_places_api_key",
                &redact(self.google_places_api_key.as_ref()),
            )
            .field(
                "melissa_license_key",
                &redact(self.melissa_license_key.as_ref()),
            )
            .field("batchdata_api_key", &redact(self.batchdata_api_key.as_ref()))
            .field("facebook_pixel_id", &self.facebook_pixel_id)
            .field(
                "facebook_access_token",
                &redact(self.facebook_access_token.as_ref()),
            )
            .field("ga4_measurement_id", &self.ga4_measurement_id)
            .field("ga4_api_secret", &redact(self.ga4_api_secret.as_ref()))
            .field(
                "pushover_app_token",
                &redact(self.pushover_app_token.as_ref()),
            )
            .field("pushover_user_key", &redact(self.pushover_user_key.as_ref()))
            .field("twilio_account_sid", &self.twilio_account_sid)
            .field("twilio_auth_token", &redact(self.twilio_auth_token.as_ref()))
            .field("twilio_from_number", &self.twilio_from_number)
            .field("twilio_whatsapp_from", &self.twilio_whatsapp_from)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub vendor_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub submit_max_attempts: u32,
    pub submit_base_delay_ms: u64,
    pub submit_max_delay_ms: u64,
    pub pending_dir: PathBuf,
    pub page_view_window_secs: u64,
    pub flush_cron: String,
    /// Externally visible origin (`https://funnel.example.com`) used to
    /// rebuild the URL Twilio signed.
    pub public_url: Option<String>,
    pub staff_phones: Vec<String>,
    pub vendors: VendorKeys,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("vendor_timeout_secs", &self.vendor_timeout_secs)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("submit_max_attempts", &self.submit_max_attempts)
            .field("submit_base_delay_ms", &self.submit_base_delay_ms)
            .field("submit_max_delay_ms", &self.submit_max_delay_ms)
            .field("pending_dir", &self.pending_dir)
            .field("page_view_window_secs", &self.page_view_window_secs)
            .field("flush_cron", &self.flush_cron)
            .field("public_url", &self.public_url)
            .field("staff_phones", &self.staff_phones.len())
            .field("vendors", &self.vendors)
            .finish()
    }
}
