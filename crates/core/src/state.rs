//! The per-user conversation state.
//!
//! Exactly one state is current per user key at any time. The state store
//! keeps the stable string label returned by [`ConversationState::as_str`];
//! anything it hands back that does not parse is treated as [`Start`], so a
//! corrupted or stale label can never strand a conversation.
//!
//! [`Start`]: ConversationState::Start

use serde::{Deserialize, Serialize};

/// Where a user currently is in the ordering dialogue.
///
/// `Start` and `Finish` both route any inbound event to the menu; they are
/// distinct labels for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    #[default]
    Start,
    Menu,
    ProductDetail,
    Cart,
    LocationRequest,
    DeliveryOptions,
    WaitingPayment,
    Finish,
}

impl ConversationState {
    /// Stable label persisted to the state store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Menu => "MENU",
            Self::ProductDetail => "PRODUCT_DETAIL",
            Self::Cart => "CART",
            Self::LocationRequest => "LOCATION_REQUEST",
            Self::DeliveryOptions => "DELIVERY_OPTIONS",
            Self::WaitingPayment => "WAITING_PAYMENT",
            Self::Finish => "FINISH",
        }
    }

    /// Parse a stored label. Unknown labels return `None`; the engine maps
    /// that to `Start`.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "START" => Some(Self::Start),
            "MENU" => Some(Self::Menu),
            "PRODUCT_DETAIL" => Some(Self::ProductDetail),
            "CART" => Some(Self::Cart),
            "LOCATION_REQUEST" => Some(Self::LocationRequest),
            "DELIVERY_OPTIONS" => Some(Self::DeliveryOptions),
            "WAITING_PAYMENT" => Some(Self::WaitingPayment),
            "FINISH" => Some(Self::Finish),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip() {
        for state in [
            ConversationState::Start,
            ConversationState::Menu,
            ConversationState::ProductDetail,
            ConversationState::Cart,
            ConversationState::LocationRequest,
            ConversationState::DeliveryOptions,
            ConversationState::WaitingPayment,
            ConversationState::Finish,
        ] {
            assert_eq!(ConversationState::from_label(state.as_str()), Some(state));
        }
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        assert_eq!(ConversationState::from_label("HANDLE_MENU"), None);
        assert_eq!(ConversationState::from_label(""), None);
        assert_eq!(ConversationState::from_label("menu"), None);
    }

    #[test]
    fn test_default_is_start() {
        assert_eq!(ConversationState::default(), ConversationState::Start);
    }
}
