//! Commerce service client (catalog, carts, flows).
//!
//! # Architecture
//!
//! - JSON REST API under `/v2`, bearer-token auth from a client-credentials
//!   grant (token cached in memory, refreshed before expiry)
//! - The service is the source of truth for products and carts - no local
//!   sync
//! - Catalog reads (products, categories, image links) are cached in-process
//!   via `moka` with a short TTL; **cart reads are never cached** - a stale
//!   snapshot would mean double charges or stale totals
//! - Fulfillment locations and customer-location history live in the
//!   service's "flows" (custom collections)

mod auth;
mod client;
pub mod types;

pub use client::{CommerceClient, CommerceConfig, NewProduct};

use async_trait::async_trait;
use thiserror::Error;

use pronto_core::cart::{CartSummary, DELIVERY_ITEM_NAME, delivery_sku};
use pronto_core::catalog::{Category, Product};

/// Errors from the commerce service.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service returned a non-success status.
    #[error("commerce API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body did not parse.
    #[error("failed to parse commerce response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl CommerceError {
    /// Whether a retry of the same call can be expected to succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Auth(_) | Self::NotFound(_) | Self::Parse(_) => false,
        }
    }
}

/// Catalog and cart operations the conversation engine depends on.
///
/// The engine owns a constructed instance behind this seam; tests
/// substitute an in-memory fake.
#[async_trait]
pub trait Commerce: Send + Sync {
    /// List products, optionally filtered to one category.
    async fn products(&self, category_id: Option<&str>) -> Result<Vec<Product>, CommerceError>;

    /// Resolve one product's display fields.
    async fn product(&self, product_id: &str) -> Result<Product, CommerceError>;

    /// List catalog categories.
    async fn categories(&self) -> Result<Vec<Category>, CommerceError>;

    /// Resolve a file id to its public URL.
    async fn image_url(&self, file_id: &str) -> Result<String, CommerceError>;

    /// Fetch a fresh priced cart snapshot. Never cached.
    async fn cart(&self, cart_owner: &str) -> Result<CartSummary, CommerceError>;

    /// Add one catalog product line to a cart.
    async fn add_cart_item(
        &self,
        cart_owner: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<(), CommerceError>;

    /// Add a custom named/priced line to a cart.
    async fn add_custom_item(
        &self,
        cart_owner: &str,
        name: &str,
        sku: &str,
        price_minor: i64,
    ) -> Result<(), CommerceError>;

    /// Remove a cart line by its cart item id.
    async fn remove_cart_item(&self, cart_owner: &str, item_id: &str)
    -> Result<(), CommerceError>;

    /// Drop a cart entirely.
    async fn delete_cart(&self, cart_owner: &str) -> Result<(), CommerceError>;

    /// Append the synthetic delivery line unless the cart already carries
    /// one.
    ///
    /// The delivery line is matched by the SKU the service derives from its
    /// display name, which keeps this idempotent under at-least-once event
    /// delivery: retries see the existing line and do nothing.
    async fn ensure_delivery_line(
        &self,
        cart_owner: &str,
        price_minor: i64,
    ) -> Result<(), CommerceError> {
        let cart = self.cart(cart_owner).await?;
        if !cart.has_delivery_line() {
            self.add_custom_item(cart_owner, DELIVERY_ITEM_NAME, &delivery_sku(), price_minor)
                .await?;
        }
        Ok(())
    }
}
