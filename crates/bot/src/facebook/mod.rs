//! Facebook Messenger transport (webhook + Send API).
//!
//! # Flow
//!
//! 1. Facebook POSTs page events to the [`webhook`] router; the signature
//!    is verified before anything is parsed
//! 2. Each messaging event decodes to a `(user key, event)` pair and goes
//!    through the engine
//! 3. Handlers render back out through the [`ChatTransport`] impl as
//!    galleries, button templates, and plain text
//!
//! [`ChatTransport`]: crate::engine::ChatTransport

mod client;
mod transport;
pub mod types;
pub mod webhook;

pub use client::FacebookClient;
pub use transport::{FACEBOOK_USER_PREFIX, FacebookTransport};

use thiserror::Error;

/// Errors from the Messenger platform.
#[derive(Debug, Error)]
pub enum FacebookError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Graph API rejected the call.
    #[error("Graph API error: {0}")]
    Api(String),
}
