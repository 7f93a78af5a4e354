//! Bot configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COMMERCE_CLIENT_ID` - Commerce API client id
//! - `COMMERCE_CLIENT_SECRET` - Commerce API client secret
//! - `GEOCODER_API_KEY` - Geocoder API key
//! - `REDIS_URL` - Redis connection URL for conversation state
//! - `TELEGRAM_TOKEN` - Telegram bot token
//! - `TELEGRAM_PAYMENT_TOKEN` - Telegram payment provider token
//! - `FACEBOOK_PAGE_TOKEN` - Messenger page access token
//! - `FACEBOOK_VERIFY_TOKEN` - Webhook subscription verify token
//! - `FACEBOOK_APP_SECRET` - App secret for webhook signatures
//!
//! ## Optional
//! - `COMMERCE_BASE_URL` - Commerce API origin (default: `https://api.moltin.com`)
//! - `PIZZERIA_FLOW_SLUG` - Fulfillment-location flow (default: `pizzeria`)
//! - `CUSTOMER_LOCATION_FLOW_SLUG` - Location history flow (default: `customer-location`)
//! - `GEOCODER_BASE_URL` - Geocoder origin (default: `https://geocode-maps.yandex.ru`)
//! - `TELEGRAM_PAYMENT_PARAMETER` - Invoice start parameter (default: `pizza`)
//! - `ORDER_PAYLOAD` - Fixed invoice payload tag (default: `pizza-order`)
//! - `CURRENCY` - ISO 4217 invoice currency (default: `RUB`)
//! - `DELIVERY_TIERS` - Tier table, e.g. `0.5:0,5:100,20:300`
//! - `MENU_PAGE_SIZE` - Products per menu page (default: 8)
//! - `FOLLOW_UP_DELAY_SECS` - Post-payment follow-up delay (default: 3600)
//! - `WEBHOOK_HOST` - Webhook bind address (default: 127.0.0.1)
//! - `WEBHOOK_PORT` - Webhook listen port (default: 3000)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use pronto_core::pricing::TierTable;

use crate::commerce::CommerceConfig;
use crate::engine::EnginePolicy;
use crate::geo::GeocoderConfig;
use crate::telegram::TelegramPaymentConfig;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Facebook transport settings.
#[derive(Clone)]
pub struct FacebookConfig {
    pub page_token: SecretString,
    pub verify_token: SecretString,
    pub app_secret: SecretString,
}

impl std::fmt::Debug for FacebookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacebookConfig")
            .field("page_token", &"[REDACTED]")
            .field("verify_token", &"[REDACTED]")
            .field("app_secret", &"[REDACTED]")
            .finish()
    }
}

/// Full bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub commerce: CommerceConfig,
    pub geocoder: GeocoderConfig,
    /// Redis connection URL (may contain a password).
    pub redis_url: SecretString,
    pub telegram_token: SecretString,
    pub telegram_payment: TelegramPaymentConfig,
    pub facebook: FacebookConfig,
    /// Webhook bind address.
    pub webhook_host: IpAddr,
    pub webhook_port: u16,
    pub tiers: TierTable,
    pub page_size: usize,
    pub order_payload: String,
    pub currency: String,
    pub follow_up_delay: Duration,
    pub sentry_dsn: Option<String>,
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let commerce = CommerceConfig {
            base_url: get_env_or_default("COMMERCE_BASE_URL", "https://api.moltin.com"),
            client_id: get_required_env("COMMERCE_CLIENT_ID")?,
            client_secret: get_required_secret("COMMERCE_CLIENT_SECRET")?,
            pizzeria_flow_slug: get_env_or_default("PIZZERIA_FLOW_SLUG", "pizzeria"),
            customer_location_flow_slug: get_env_or_default(
                "CUSTOMER_LOCATION_FLOW_SLUG",
                "customer-location",
            ),
        };

        let geocoder = GeocoderConfig {
            base_url: get_env_or_default("GEOCODER_BASE_URL", "https://geocode-maps.yandex.ru"),
            api_key: get_required_secret("GEOCODER_API_KEY")?,
        };

        let telegram_payment = TelegramPaymentConfig {
            provider_token: get_required_secret("TELEGRAM_PAYMENT_TOKEN")?,
            start_parameter: get_env_or_default("TELEGRAM_PAYMENT_PARAMETER", "pizza"),
        };

        let facebook = FacebookConfig {
            page_token: get_required_secret("FACEBOOK_PAGE_TOKEN")?,
            verify_token: get_required_secret("FACEBOOK_VERIFY_TOKEN")?,
            app_secret: get_required_secret("FACEBOOK_APP_SECRET")?,
        };

        let webhook_host = get_env_or_default("WEBHOOK_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("WEBHOOK_HOST".to_owned(), e.to_string()))?;
        let webhook_port = get_env_or_default("WEBHOOK_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("WEBHOOK_PORT".to_owned(), e.to_string()))?;

        let tiers = match get_optional_env("DELIVERY_TIERS") {
            Some(raw) => parse_tier_table(&raw)?,
            None => TierTable::default(),
        };

        let page_size = get_env_or_default("MENU_PAGE_SIZE", "8")
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar("MENU_PAGE_SIZE".to_owned(), e.to_string()))?;

        let follow_up_delay = get_env_or_default("FOLLOW_UP_DELAY_SECS", "3600")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("FOLLOW_UP_DELAY_SECS".to_owned(), e.to_string())
            })?;

        Ok(Self {
            commerce,
            geocoder,
            redis_url: get_required_secret("REDIS_URL")?,
            telegram_token: get_required_secret("TELEGRAM_TOKEN")?,
            telegram_payment,
            facebook,
            webhook_host,
            webhook_port,
            tiers,
            page_size,
            order_payload: get_env_or_default("ORDER_PAYLOAD", "pizza-order"),
            currency: get_env_or_default("CURRENCY", "RUB"),
            follow_up_delay,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }

    /// Returns the socket address for binding the webhook server.
    #[must_use]
    pub const fn webhook_addr(&self) -> SocketAddr {
        SocketAddr::new(self.webhook_host, self.webhook_port)
    }

    /// Engine tunables derived from this configuration.
    #[must_use]
    pub fn engine_policy(&self) -> EnginePolicy {
        EnginePolicy {
            tiers: self.tiers.clone(),
            page_size: self.page_size,
            order_payload: self.order_payload.clone(),
            currency: self.currency.clone(),
            confirmation_delay: self.follow_up_delay,
        }
    }
}

/// Parse a tier table from `max_km:price_minor` pairs joined by commas,
/// e.g. `0.5:0,5:100,20:300`.
fn parse_tier_table(raw: &str) -> Result<TierTable, ConfigError> {
    let invalid =
        |detail: &str| ConfigError::InvalidEnvVar("DELIVERY_TIERS".to_owned(), detail.to_owned());

    let mut tiers = Vec::new();
    for pair in raw.split(',') {
        let (bound, price) = pair
            .split_once(':')
            .ok_or_else(|| invalid(&format!("expected max_km:price_minor, got {pair:?}")))?;
        let bound: f64 = bound
            .trim()
            .parse()
            .map_err(|_| invalid(&format!("bad distance bound {bound:?}")))?;
        let price: i64 = price
            .trim()
            .parse()
            .map_err(|_| invalid(&format!("bad price {price:?}")))?;
        tiers.push((bound, price));
    }
    if tiers.is_empty() {
        return Err(invalid("at least one tier is required"));
    }
    Ok(TierTable::new(tiers))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    get_required_env(key).map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tier_table() {
        let table = parse_tier_table("0.5:0,5:100,20:300").expect("parses");
        assert_eq!(table.price_for_distance(0.4), Some(0));
        assert_eq!(table.price_for_distance(12.0), Some(300));
        assert_eq!(table.price_for_distance(21.0), None);
    }

    #[test]
    fn test_parse_tier_table_tolerates_spaces() {
        let table = parse_tier_table("0.5:0, 5:100, 20:300").expect("parses");
        assert_eq!(table.price_for_distance(3.0), Some(100));
    }

    #[test]
    fn test_parse_tier_table_rejects_garbage() {
        assert!(parse_tier_table("").is_err());
        assert!(parse_tier_table("0.5").is_err());
        assert!(parse_tier_table("near:free").is_err());
    }

    #[test]
    fn test_facebook_config_debug_redacts_secrets() {
        let config = FacebookConfig {
            page_token: SecretString::from("page-token-value"),
            verify_token: SecretString::from("verify-token-value"),
            app_secret: SecretString::from("app-secret-value"),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("page-token-value"));
        assert!(!debug_output.contains("app-secret-value"));
    }
}
