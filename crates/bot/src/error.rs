//! Engine-level error taxonomy.
//!
//! Remote-call failures are retryable because a failed dispatch never
//! persists a state change: the user's next message re-enters the same
//! state. Input problems are handled locally by re-prompting; a payment
//! precheck mismatch declines the charge and leaves the state alone.

use thiserror::Error;

use crate::commerce::CommerceError;
use crate::engine::transport::TransportError;
use crate::geo::GeoError;
use crate::store::StoreError;

/// Anything a dispatch can fail with.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The precheck payload did not carry the expected order tag; the
    /// charge was declined.
    #[error("payment payload mismatch: got {got:?}")]
    PaymentPayloadMismatch { got: String },

    /// An inbound event that cannot be acted on in any state.
    #[error("invalid inbound event: {0}")]
    InvalidInput(String),
}

impl EngineError {
    /// Whether redelivering the same event can be expected to succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Commerce(err) => err.is_transient(),
            Self::Geo(err) => err.is_transient(),
            Self::Store(err) => err.is_transient(),
            Self::Transport(err) => err.is_transient(),
            Self::PaymentPayloadMismatch { .. } | Self::InvalidInput(_) => false,
        }
    }
}
