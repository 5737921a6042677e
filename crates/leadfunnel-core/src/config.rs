use crate::app_config::{AppConfig, Environment, VendorKeys};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every vendor credential is optional: an absent key disables that
/// integration. Blank values are treated the same as absent ones.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        optional(var).unwrap_or_else(|| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let env = parse_environment(&or_default("FUNNEL_ENV", "development"));
    let bind_addr = parse_addr("FUNNEL_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("FUNNEL_LOG_LEVEL", "info");
    let database_url = optional("DATABASE_URL");

    let db_max_connections = parse_u32("FUNNEL_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("FUNNEL_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("FUNNEL_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let vendor_timeout_secs = parse_u64("FUNNEL_VENDOR_TIMEOUT_SECS", "8")?;
    let cache_ttl_secs = parse_u64("FUNNEL_CACHE_TTL_SECS", "300")?;

    let submit_max_attempts = parse_u32("FUNNEL_SUBMIT_MAX_ATTEMPTS", "10")?;
    if submit_max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "FUNNEL_SUBMIT_MAX_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let submit_base_delay_ms = parse_u64("FUNNEL_SUBMIT_BASE_DELAY_MS", "1000")?;
    let submit_max_delay_ms = parse_u64("FUNNEL_SUBMIT_MAX_DELAY_MS", "30000")?;
    let pending_dir = PathBuf::from(or_default("FUNNEL_PENDING_DIR", "./data/pending"));

    let page_view_window_secs = parse_u64("FUNNEL_PAGE_VIEW_WINDOW_SECS", "30")?;
    let flush_cron = or_default("FUNNEL_FLUSH_CRON", "0 */5 * * * *");
    let public_url =
        optional("FUNNEL_PUBLIC_URL").map(|url| url.trim_end_matches('/').to_string());

    let staff_phones = optional("FUNNEL_STAFF_PHONES")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let vendors = VendorKeys {
        google_places_api_key: optional("GOOGLE_PLACES_API_KEY"),
        melissa_license_key: optional("MELISSA_LICENSE_KEY"),
        batchdata_api_key: optional("BATCHDATA_API_KEY"),
        facebook_pixel_id: optional("FACEBOOK_PIXEL_ID"),
        facebook_access_token: optional("FACEBOOK_ACCESS_TOKEN"),
        ga4_measurement_id: optional("GA4_MEASUREMENT_ID"),
        ga4_api_secret: optional("GA4_API_SECRET"),
        pushover_app_token: optional("PUSHOVER_APP_TOKEN"),
        pushover_user_key: optional("PUSHOVER_USER_KEY"),
        twilio_account_sid: optional("TWILIO_ACCOUNT_SID"),
        twilio_auth_token: optional("TWILIO_AUTH_TOKEN"),
        twilio_from_number: optional("TWILIO_FROM_NUMBER"),
        twilio_whatsapp_from: optional("TWILIO_WHATSAPP_FROM"),
    };

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        database_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        vendor_timeout_secs,
        cache_ttl_secs,
        submit_max_attempts,
        submit_base_delay_ms,
        submit_max_delay_ms,
        pending_dir,
        page_view_window_secs,
        flush_cron,
        public_url,
        staff_phones,
        vendors,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn parse_environment_production() {
        assert_eq!(parse_environment("production"), Environment::Production);
    }

    #[test]
    fn parse_environment_unknown_defaults_to_development() {
        assert_eq!(parse_environment("staging"), Environment::Development);
    }

    #[test]
    fn empty_env_yields_defaults() {
        let map: HashMap<&str, &str> = HashMap::new();
        let cfg = build_app_config(lookup_from_map(&map)).expect("defaults should parse");
        assert_eq!(cfg.env, Environment::Development);
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.vendor_timeout_secs, 8);
        assert_eq!(cfg.cache_ttl_secs, 300);
        assert_eq!(cfg.submit_max_attempts, 10);
        assert_eq!(cfg.submit_base_delay_ms, 1000);
        assert_eq!(cfg.submit_max_delay_ms, 30_000);
        assert_eq!(cfg.page_view_window_secs, 30);
        assert_eq!(cfg.flush_cron, "0 */5 * * * *");
        assert!(cfg.staff_phones.is_empty());
        assert_eq!(cfg.vendors, VendorKeys::default());
    }

    #[test]
    fn vendor_keys_are_read_and_blank_values_ignored() {
        let mut map = HashMap::new();
        map.insert("MELISSA_LICENSE_KEY", "mel-123");
        map.insert("BATCHDATA_API_KEY", "   ");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.vendors.melissa_license_key.as_deref(), Some("mel-123"));
        assert!(cfg.vendors.batchdata_api_key.is_none());
    }

    #[test]
    fn staff_phones_are_split_on_commas() {
        let mut map = HashMap::new();
        map.insert("FUNNEL_STAFF_PHONES", "+15551234567, ,+15557654321");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.staff_phones, vec!["+15551234567", "+15557654321"]);
    }

    #[test]
    fn public_url_drops_trailing_slash() {
        let mut map = HashMap::new();
        map.insert("FUNNEL_PUBLIC_URL", "https://funnel.example.com/");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.public_url.as_deref(), Some("https://funnel.example.com"));
    }

    #[test]
    fn invalid_bind_addr_is_rejected() {
        let mut map = HashMap::new();
        map.insert("FUNNEL_BIND_ADDR", "not-a-socket-addr");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FUNNEL_BIND_ADDR"),
            "expected InvalidEnvVar(FUNNEL_BIND_ADDR), got: {result:?}"
        );
    }

    #[test]
    fn invalid_vendor_timeout_is_rejected() {
        let mut map = HashMap::new();
        map.insert("FUNNEL_VENDOR_TIMEOUT_SECS", "eight");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FUNNEL_VENDOR_TIMEOUT_SECS"),
            "got: {result:?}"
        );
    }

    #[test]
    fn zero_submit_attempts_is_rejected() {
        let mut map = HashMap::new();
        map.insert("FUNNEL_SUBMIT_MAX_ATTEMPTS", "0");
        let result = build_app_config(lookup_from_map(&map));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FUNNEL_SUBMIT_MAX_ATTEMPTS"
        ));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut map = HashMap::new();
        map.insert("DATABASE_URL", "postgres://user:hunter2@db/leads");
        map.insert("TWILIO_AUTH_TOKEN", "tw-secret");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("tw-secret"));
        assert!(rendered.contains("[redacted]"));
    }
}
