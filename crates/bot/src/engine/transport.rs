//! The outbound transport seam.
//!
//! Handlers render through this trait; the Telegram and Facebook adapters
//! implement it. `user_key` arguments are transport-prefixed user keys
//! (`telegram:…`, `facebook:…`); courier notifications pass a raw channel
//! id, so adapters accept both forms.

use async_trait::async_trait;
use thiserror::Error;

use pronto_core::location::Coordinate;

use super::views::{
    CartView, DeliveryOptionsView, Invoice, MenuView, PrecheckOutcome, ProductCard,
};

/// Errors from delivering outbound content.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The platform call failed (network or API error).
    #[error("transport request failed: {0}")]
    Send(String),

    /// The user key or channel id does not fit this platform.
    #[error("invalid chat reference: {0}")]
    BadChatRef(String),
}

impl TransportError {
    /// Whether a retry of the same call can be expected to succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Send(_))
    }
}

/// Everything the engine can show a user.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Plain text message.
    async fn send_text(&self, user_key: &str, text: &str) -> Result<(), TransportError>;

    /// A paginated product menu.
    async fn send_menu(&self, user_key: &str, menu: &MenuView) -> Result<(), TransportError>;

    /// A product detail card with an add-to-cart control.
    async fn send_product_card(
        &self,
        user_key: &str,
        card: &ProductCard,
    ) -> Result<(), TransportError>;

    /// The cart with per-line removal and a checkout control.
    async fn send_cart(&self, user_key: &str, view: &CartView) -> Result<(), TransportError>;

    /// Ask for a street address or a shared location.
    async fn request_location(&self, user_key: &str) -> Result<(), TransportError>;

    /// The delivery-or-pickup decision screen.
    async fn send_delivery_options(
        &self,
        user_key: &str,
        view: &DeliveryOptionsView,
    ) -> Result<(), TransportError>;

    /// Order summary with a pay control.
    async fn send_payment_prompt(&self, user_key: &str, text: &str)
    -> Result<(), TransportError>;

    /// An itemized invoice.
    async fn send_invoice(&self, user_key: &str, invoice: &Invoice)
    -> Result<(), TransportError>;

    /// Answer a payment precheck round-trip.
    async fn answer_precheck(
        &self,
        query_id: &str,
        outcome: PrecheckOutcome,
    ) -> Result<(), TransportError>;

    /// Share a map point, e.g. the customer's coordinates with a courier.
    async fn send_location(
        &self,
        channel_id: &str,
        coordinate: Coordinate,
    ) -> Result<(), TransportError>;

    /// A transient acknowledgement ("added to your cart"). Platforms
    /// without toasts fall back to a plain message.
    async fn toast(&self, user_key: &str, text: &str) -> Result<(), TransportError>;
}
