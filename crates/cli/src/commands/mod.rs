//! CLI command implementations.

pub mod cart;
pub mod seed;

use secrecy::SecretString;

use pronto_bot::commerce::{CommerceClient, CommerceConfig};

/// Build a commerce client from the same environment the bot reads.
///
/// # Errors
///
/// Returns an error naming the missing variable.
pub fn commerce_client_from_env() -> Result<CommerceClient, Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let required = |key: &str| -> Result<String, Box<dyn std::error::Error>> {
        std::env::var(key).map_err(|_| format!("Missing environment variable: {key}").into())
    };

    let config = CommerceConfig {
        base_url: std::env::var("COMMERCE_BASE_URL")
            .unwrap_or_else(|_| "https://api.moltin.com".to_owned()),
        client_id: required("COMMERCE_CLIENT_ID")?,
        client_secret: SecretString::from(required("COMMERCE_CLIENT_SECRET")?),
        pizzeria_flow_slug: std::env::var("PIZZERIA_FLOW_SLUG")
            .unwrap_or_else(|_| "pizzeria".to_owned()),
        customer_location_flow_slug: std::env::var("CUSTOMER_LOCATION_FLOW_SLUG")
            .unwrap_or_else(|_| "customer-location".to_owned()),
    };

    Ok(CommerceClient::new(config))
}
