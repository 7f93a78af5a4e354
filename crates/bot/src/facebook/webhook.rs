//! Webhook endpoint for Messenger page events.
//!
//! Facebook first verifies the subscription with a GET challenge, then
//! POSTs page events. Every POST body is authenticated against the app
//! secret via `X-Hub-Signature-256` before it is parsed.
//!
//! See: <https://developers.facebook.com/docs/messenger-platform/webhooks>

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::commerce::Commerce;
use crate::engine::Engine;
use crate::geo::Locations;
use crate::store::StateStore;

use super::transport::FacebookTransport;
use super::types::WebhookPayload;

/// Shared state behind the webhook routes.
pub struct WebhookState<C, L, S> {
    inner: Arc<WebhookStateInner<C, L, S>>,
}

impl<C, L, S> Clone for WebhookState<C, L, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct WebhookStateInner<C, L, S> {
    engine: Engine<C, L, S, FacebookTransport>,
    verify_token: SecretString,
    app_secret: SecretString,
}

impl<C, L, S> WebhookState<C, L, S> {
    #[must_use]
    pub fn new(
        engine: Engine<C, L, S, FacebookTransport>,
        verify_token: SecretString,
        app_secret: SecretString,
    ) -> Self {
        Self {
            inner: Arc::new(WebhookStateInner {
                engine,
                verify_token,
                app_secret,
            }),
        }
    }
}

/// Build the webhook router.
pub fn router<C, L, S>(state: WebhookState<C, L, S>) -> Router
where
    C: Commerce + 'static,
    L: Locations + 'static,
    S: StateStore + 'static,
{
    Router::new()
        .route("/webhook", get(verify::<C, L, S>).post(receive::<C, L, S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Subscription verification handshake.
async fn verify<C, L, S>(
    State(state): State<WebhookState<C, L, S>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String)
where
    C: Commerce + 'static,
    L: Locations + 'static,
    S: StateStore + 'static,
{
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge");

    if mode == Some("subscribe")
        && let Some(challenge) = challenge
    {
        if token == Some(state.inner.verify_token.expose_secret()) {
            info!("webhook subscription verified");
            return (StatusCode::OK, challenge.clone());
        }
        warn!("webhook verification token mismatch");
        return (
            StatusCode::FORBIDDEN,
            "Verification token mismatch".to_owned(),
        );
    }

    (StatusCode::OK, "Hello world".to_owned())
}

/// Page event delivery.
async fn receive<C, L, S>(
    State(state): State<WebhookState<C, L, S>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str)
where
    C: Commerce + 'static,
    L: Locations + 'static,
    S: StateStore + 'static,
{
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if let Err(reason) = verify_signature(&state.inner.app_secret, &body, signature) {
        warn!(reason = %reason, "rejected webhook delivery");
        return (StatusCode::FORBIDDEN, "bad signature");
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "unparseable webhook body");
            return (StatusCode::BAD_REQUEST, "bad request");
        }
    };

    if payload.object != "page" {
        return (StatusCode::OK, "ignored");
    }

    for entry in payload.entry {
        for event in entry.messaging {
            let Some((user_key, inbound)) = FacebookTransport::decode(event) else {
                continue;
            };
            if let Err(err) = state.inner.engine.handle_event(&user_key, inbound).await {
                if err.is_transient() {
                    warn!(user = %user_key, error = %err, "dispatch failed, state unchanged");
                } else {
                    error!(user = %user_key, error = %err, "dispatch rejected");
                }
            }
        }
    }

    (StatusCode::OK, "ok")
}

/// Verify an `X-Hub-Signature-256` header against the raw body.
///
/// The header carries `sha256=<hex HMAC of the body keyed by the app
/// secret>`.
///
/// # Errors
///
/// Returns a human-readable reason when the header is missing, malformed,
/// or does not match.
pub fn verify_signature(
    app_secret: &SecretString,
    body: &[u8],
    signature_header: &str,
) -> Result<(), String> {
    let Some(signature) = signature_header.strip_prefix("sha256=") else {
        return Err("missing or malformed signature header".to_owned());
    };

    let mut mac = Hmac::<Sha256>::new_from_slice(app_secret.expose_secret().as_bytes())
        .map_err(|err| err.to_string())?;
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_compare(&expected, signature) {
        return Err("signature mismatch".to_owned());
    }

    Ok(())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("valid key length");
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_signature_verification_valid() {
        let secret = SecretString::from("app-secret");
        let body = br#"{"object":"page","entry":[]}"#;
        let header = sign("app-secret", body);
        assert!(verify_signature(&secret, body, &header).is_ok());
    }

    #[test]
    fn test_signature_verification_tampered_body() {
        let secret = SecretString::from("app-secret");
        let header = sign("app-secret", b"original");
        assert!(verify_signature(&secret, b"tampered", &header).is_err());
    }

    #[test]
    fn test_signature_verification_wrong_secret() {
        let secret = SecretString::from("app-secret");
        let body = b"payload";
        let header = sign("other-secret", body);
        assert!(verify_signature(&secret, body, &header).is_err());
    }

    #[test]
    fn test_signature_verification_malformed_header() {
        let secret = SecretString::from("app-secret");
        assert!(verify_signature(&secret, b"payload", "").is_err());
        assert!(verify_signature(&secret, b"payload", "md5=abc").is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }
}
