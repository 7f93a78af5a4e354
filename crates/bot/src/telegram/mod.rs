//! Telegram transport (long-polling Bot API).
//!
//! # Flow
//!
//! 1. [`poll::run`] long-polls `getUpdates` and hands each update to
//!    [`TelegramTransport::decode`]
//! 2. Decoded `(user key, event)` pairs go through the engine
//! 3. Handlers render back out through the [`ChatTransport`] impl
//!
//! [`ChatTransport`]: crate::engine::ChatTransport

pub mod poll;
mod client;
mod transport;
pub mod types;

pub use client::TelegramClient;
pub use transport::{TELEGRAM_USER_PREFIX, TelegramPaymentConfig, TelegramTransport};

use thiserror::Error;

/// Errors from the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Bot API answered `ok: false`.
    #[error("Bot API error: {0}")]
    Api(String),

    /// A request body failed to serialize.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
