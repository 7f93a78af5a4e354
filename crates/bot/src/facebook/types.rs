//! Facebook Messenger platform types.
//!
//! Inbound webhook shapes and the Send API message bodies this bot uses
//! (text, button template, generic template).
//!
//! See: <https://developers.facebook.com/docs/messenger-platform>

use serde::{Deserialize, Serialize};

// =============================================================================
// Inbound webhook
// =============================================================================

/// The POST body Facebook delivers to the webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// `"page"` for page subscriptions.
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    pub sender: Sender,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub postback: Option<Postback>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

/// Shared-location coordinates. Facebook names the longitude `long`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    #[serde(rename = "long")]
    pub lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postback {
    pub payload: String,
}

// =============================================================================
// Send API
// =============================================================================

/// One card of a generic-template gallery.
#[derive(Debug, Clone, Serialize)]
pub struct GenericElement {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<PostbackButton>,
}

/// A postback button carrying an encoded callback payload.
#[derive(Debug, Clone, Serialize)]
pub struct PostbackButton {
    #[serde(rename = "type")]
    pub button_type: &'static str,
    pub title: String,
    pub payload: String,
}

impl PostbackButton {
    #[must_use]
    pub fn new(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            button_type: "postback",
            title: title.into(),
            payload: payload.into(),
        }
    }
}

/// Error envelope the Graph API answers failures with.
#[derive(Debug, Deserialize)]
pub struct GraphErrorResponse {
    #[serde(default)]
    pub error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphError {
    pub message: String,
}
