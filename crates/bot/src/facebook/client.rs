//! Facebook Send API client.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::instrument;

use super::FacebookError;
use super::types::{GenericElement, GraphErrorResponse, PostbackButton};

/// Graph API Send endpoint.
const SEND_API_URL: &str = "https://graph.facebook.com/v2.6/me/messages";

/// Client for delivering messages through the Send API.
#[derive(Clone)]
pub struct FacebookClient {
    client: reqwest::Client,
    page_token: SecretString,
}

impl std::fmt::Debug for FacebookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacebookClient")
            .field("page_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl FacebookClient {
    #[must_use]
    pub fn new(page_token: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            page_token,
        }
    }

    async fn send(&self, recipient_id: &str, message: &impl Serialize) -> Result<(), FacebookError> {
        let body = serde_json::json!({
            "recipient": { "id": recipient_id },
            "message": message,
        });

        let response = self
            .client
            .post(SEND_API_URL)
            .query(&[("access_token", self.page_token.expose_secret())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GraphErrorResponse>(&text)
                .ok()
                .and_then(|envelope| envelope.error)
                .map_or_else(|| format!("HTTP {status}"), |error| error.message);
            tracing::error!(status = %status, error = %message, "Send API error");
            return Err(FacebookError::Api(message));
        }

        Ok(())
    }

    /// Deliver a plain text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the Graph API rejects it.
    #[instrument(skip(self, text), fields(recipient = %recipient_id))]
    pub async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), FacebookError> {
        self.send(recipient_id, &serde_json::json!({ "text": text }))
            .await
    }

    /// Deliver a generic-template gallery.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the Graph API rejects it.
    #[instrument(skip(self, elements), fields(recipient = %recipient_id, cards = elements.len()))]
    pub async fn send_gallery(
        &self,
        recipient_id: &str,
        elements: &[GenericElement],
    ) -> Result<(), FacebookError> {
        self.send(
            recipient_id,
            &serde_json::json!({
                "attachment": {
                    "type": "template",
                    "payload": {
                        "template_type": "generic",
                        "image_aspect_ratio": "square",
                        "elements": elements,
                    }
                }
            }),
        )
        .await
    }

    /// Deliver text with up to three postback buttons.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the Graph API rejects it.
    #[instrument(skip(self, text, buttons), fields(recipient = %recipient_id))]
    pub async fn send_buttons(
        &self,
        recipient_id: &str,
        text: &str,
        buttons: &[PostbackButton],
    ) -> Result<(), FacebookError> {
        self.send(
            recipient_id,
            &serde_json::json!({
                "attachment": {
                    "type": "template",
                    "payload": {
                        "template_type": "button",
                        "text": text,
                        "buttons": buttons,
                    }
                }
            }),
        )
        .await
    }
}
