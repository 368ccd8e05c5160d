use std::env;
use std::time::Duration;

use wayfare_core::responder::DEFAULT_AUTO_REPLY_THRESHOLD;

const DEFAULT_ALLOWED_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:8080",
    "http://127.0.0.1:8080",
];

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_seconds: u64,
    pub api_base: String,
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub database_url: Option<String>,
    pub force_https: bool,
    pub session_ttl: Duration,
    pub cookie_name: String,
    pub allowed_origins: Vec<String>,
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
    pub admin_emails: Vec<String>,
    pub gateway: Option<GatewayConfig>,
    pub payment_simulation: bool,
    pub auto_reply_threshold: f32,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub auth_rate_limit_max: usize,
    /// Front-end base URL used in password-reset links.
    pub public_url: String,
    pub password_reset_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            database_url: None,
            force_https: false,
            session_ttl: Duration::from_secs(1800),
            cookie_name: "wayfare_session".to_string(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
            mail_relay_url: None,
            mail_from: "bookings@wayfare.local".to_string(),
            admin_emails: vec!["admin@wayfare.local".to_string()],
            gateway: None,
            payment_simulation: true,
            auto_reply_threshold: DEFAULT_AUTO_REPLY_THRESHOLD,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 120,
            auth_rate_limit_max: 12,
            public_url: "http://localhost:3000".to_string(),
            password_reset_ttl: Duration::from_secs(3600),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let gateway = non_empty("WAYFARE_STRIPE_SECRET_KEY").map(|secret_key| GatewayConfig {
            secret_key,
            webhook_secret: non_empty("WAYFARE_STRIPE_WEBHOOK_SECRET"),
            webhook_tolerance_seconds: parsed("WAYFARE_STRIPE_WEBHOOK_TOLERANCE_SECONDS")
                .unwrap_or(300),
            api_base: non_empty("WAYFARE_STRIPE_API_BASE")
                .unwrap_or_else(|| "https://api.stripe.com".to_string()),
        });
        let payment_simulation =
            flag("WAYFARE_PAYMENT_SIMULATION").unwrap_or(gateway.is_none());

        Self {
            bind: non_empty("WAYFARE_BIND").unwrap_or(defaults.bind),
            database_url: non_empty("WAYFARE_DATABASE_URL"),
            force_https: flag("WAYFARE_FORCE_HTTPS").unwrap_or(false),
            session_ttl: parsed("WAYFARE_SESSION_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            cookie_name: non_empty("WAYFARE_SESSION_COOKIE_NAME").unwrap_or(defaults.cookie_name),
            allowed_origins: non_empty("WAYFARE_ALLOWED_ORIGINS")
                .map(|value| split_list(&value, |origin| origin.trim_end_matches('/').to_string()))
                .unwrap_or(defaults.allowed_origins),
            mail_relay_url: non_empty("WAYFARE_MAIL_RELAY_URL"),
            mail_from: non_empty("WAYFARE_MAIL_FROM").unwrap_or(defaults.mail_from),
            admin_emails: non_empty("WAYFARE_ADMIN_EMAILS")
                .map(|value| split_list(&value, str::to_lowercase))
                .unwrap_or(defaults.admin_emails),
            gateway,
            payment_simulation,
            auto_reply_threshold: parsed("WAYFARE_AUTO_REPLY_THRESHOLD")
                .unwrap_or(defaults.auto_reply_threshold),
            rate_limit_window: parsed("WAYFARE_RATE_LIMIT_WINDOW_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: parsed("WAYFARE_RATE_LIMIT_MAX").unwrap_or(defaults.rate_limit_max),
            auth_rate_limit_max: parsed("WAYFARE_AUTH_RATE_LIMIT_MAX")
                .unwrap_or(defaults.auth_rate_limit_max),
            public_url: non_empty("WAYFARE_PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_url),
            password_reset_ttl: parsed("WAYFARE_PASSWORD_RESET_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.password_reset_ttl),
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    non_empty(key).and_then(|value| value.parse::<T>().ok())
}

fn flag(key: &str) -> Option<bool> {
    non_empty(key).and_then(|value| parse_flag(&value))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(value: &str, normalize: impl Fn(&str) -> String) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(normalize)
        .collect()
}
