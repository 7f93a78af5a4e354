//! Commerce service authentication.
//!
//! The service issues short-lived bearer tokens from a client-credentials
//! grant. Tokens are cached in memory and refreshed shortly before their
//! reported expiry.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::CommerceError;

/// Seconds knocked off the reported expiry so a token is never used at the
/// edge of its lifetime.
const TOKEN_EXPIRY_SLACK_SECS: i64 = 10;

/// A cached bearer token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// Full `Authorization` header value (`Bearer <token>`).
    pub header_value: SecretString,
    /// Unix timestamp after which the token must be refreshed.
    pub expires_at: i64,
}

impl AccessToken {
    /// Whether the token is still safely usable.
    #[must_use]
    pub fn is_valid(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    /// Unix timestamp when the token expires.
    expires: i64,
}

/// Fetch a fresh token from the client-credentials endpoint.
///
/// # Errors
///
/// Returns `CommerceError::Http` on transport failure and
/// `CommerceError::Auth` when the service rejects the credentials.
#[instrument(skip_all)]
pub async fn fetch_token(
    client: &reqwest::Client,
    base_url: &str,
    client_id: &str,
    client_secret: &SecretString,
) -> Result<AccessToken, CommerceError> {
    let response = client
        .post(format!("{base_url}/oauth/access_token"))
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret.expose_secret()),
            ("grant_type", "client_credentials"),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CommerceError::Auth(format!("HTTP {status}: {body}")));
    }

    let token: TokenResponse = response.json().await?;
    debug!(expires = token.expires, "commerce token refreshed");

    Ok(AccessToken {
        header_value: SecretString::from(format!("{} {}", token.token_type, token.access_token)),
        expires_at: token.expires - TOKEN_EXPIRY_SLACK_SECS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_validity_respects_expiry() {
        let token = AccessToken {
            header_value: SecretString::from("Bearer abc"),
            expires_at: 1_000,
        };
        assert!(token.is_valid(999));
        assert!(!token.is_valid(1_000));
        assert!(!token.is_valid(2_000));
    }
}
