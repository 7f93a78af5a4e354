//! Inbound events and the callback payload codec.
//!
//! Each chat platform delivers button presses as an opaque string riding on
//! the message. [`CallbackPayload`] is the structured form of that intent;
//! it is encoded with [`CallbackPayload::encode`] when a keyboard is built
//! and parsed back with [`CallbackPayload::parse`] when the press comes in.
//! The conversation engine only ever sees the parsed form.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single decoded platform event, consumed once per dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Free-text chat message.
    TextMessage(String),
    /// A live or pinned location shared by the user.
    LocationShared { longitude: f64, latitude: f64 },
    /// A product picked from the menu keyboard.
    MenuSelection(String),
    /// Any other button press, already parsed.
    Postback(CallbackPayload),
    /// Payment provider pre-charge validation round-trip.
    PaymentPrecheck { query_id: String, payload: String },
    /// Funds were captured.
    PaymentCompleted,
}

/// Structured cross-request intent carried on keyboard buttons.
///
/// Serialized only at the transport boundary; the wire form is a compact
/// `tag` or `tag:field[:field...]` string that fits Telegram's 64-byte
/// callback-data limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallbackPayload {
    /// Back to the menu.
    Menu,
    /// Show the cart.
    Cart,
    /// Begin checkout.
    Checkout,
    /// Show a product's detail card.
    Product(String),
    /// Menu page starting at this product offset.
    Page { start: usize },
    /// Re-render the menu filtered to a category.
    Category(String),
    /// Add one unit of a product to the cart.
    AddToCart(String),
    /// Remove a cart line by its cart item id.
    RemoveItem(String),
    /// Accept the quoted delivery to the resolved coordinate.
    Delivery {
        price_minor: i64,
        longitude: f64,
        latitude: f64,
    },
    /// Pick the order up from this fulfillment location.
    Pickup(String),
    /// Go back and enter a different address.
    ChangeAddress,
    /// Request the invoice.
    Pay,
}

/// A button payload that did not decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized callback payload: {0:?}")]
pub struct PayloadError(pub String);

impl CallbackPayload {
    /// Encode for the wire.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Menu => "menu".to_owned(),
            Self::Cart => "cart".to_owned(),
            Self::Checkout => "checkout".to_owned(),
            Self::Product(id) => format!("product:{id}"),
            Self::Page { start } => format!("page:{start}"),
            Self::Category(id) => format!("category:{id}"),
            Self::AddToCart(id) => format!("add:{id}"),
            Self::RemoveItem(id) => format!("remove:{id}"),
            Self::Delivery {
                price_minor,
                longitude,
                latitude,
            } => format!("delivery:{price_minor}:{longitude}:{latitude}"),
            Self::Pickup(id) => format!("pickup:{id}"),
            Self::ChangeAddress => "change-address".to_owned(),
            Self::Pay => "pay".to_owned(),
        }
    }

    /// Parse a wire payload.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] for unknown tags or malformed fields; the
    /// engine treats that as invalid user input and re-prompts.
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        let err = || PayloadError(raw.to_owned());

        let (tag, rest) = raw.split_once(':').unwrap_or((raw, ""));
        match (tag, rest) {
            ("menu", "") => Ok(Self::Menu),
            ("cart", "") => Ok(Self::Cart),
            ("checkout", "") => Ok(Self::Checkout),
            ("change-address", "") => Ok(Self::ChangeAddress),
            ("pay", "") => Ok(Self::Pay),
            ("product", id) if !id.is_empty() => Ok(Self::Product(id.to_owned())),
            ("category", id) if !id.is_empty() => Ok(Self::Category(id.to_owned())),
            ("add", id) if !id.is_empty() => Ok(Self::AddToCart(id.to_owned())),
            ("remove", id) if !id.is_empty() => Ok(Self::RemoveItem(id.to_owned())),
            ("pickup", id) if !id.is_empty() => Ok(Self::Pickup(id.to_owned())),
            ("page", start) => Ok(Self::Page {
                start: start.parse().map_err(|_| err())?,
            }),
            ("delivery", fields) => {
                let mut parts = fields.splitn(3, ':');
                let price_minor = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
                let longitude = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
                let latitude = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
                Ok(Self::Delivery {
                    price_minor,
                    longitude,
                    latitude,
                })
            }
            _ => Err(err()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_only_payloads() {
        assert_eq!(CallbackPayload::parse("menu"), Ok(CallbackPayload::Menu));
        assert_eq!(CallbackPayload::parse("cart"), Ok(CallbackPayload::Cart));
        assert_eq!(CallbackPayload::parse("pay"), Ok(CallbackPayload::Pay));
        assert_eq!(
            CallbackPayload::parse("change-address"),
            Ok(CallbackPayload::ChangeAddress)
        );
    }

    #[test]
    fn test_delivery_payload_round_trips() {
        let payload = CallbackPayload::Delivery {
            price_minor: 300,
            longitude: 37.618_423,
            latitude: 55.751_244,
        };
        let wire = payload.encode();
        assert_eq!(CallbackPayload::parse(&wire), Ok(payload));
        // Telegram rejects callback data over 64 bytes.
        assert!(wire.len() <= 64, "wire form too long: {wire}");
    }

    #[test]
    fn test_page_payload_carries_offset() {
        assert_eq!(
            CallbackPayload::parse("page:16"),
            Ok(CallbackPayload::Page { start: 16 })
        );
        assert_eq!(CallbackPayload::Page { start: 8 }.encode(), "page:8");
    }

    #[test]
    fn test_product_ids_pass_through_verbatim() {
        let id = "4531e739-3554-4042-9dfe-1972a860e6fe";
        assert_eq!(
            CallbackPayload::parse(&format!("add:{id}")),
            Ok(CallbackPayload::AddToCart(id.to_owned()))
        );
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        for raw in [
            "",
            "unknown",
            "page:abc",
            "add:",
            "delivery:100",
            "delivery:100:x:y",
            "menu:extra",
        ] {
            assert!(CallbackPayload::parse(raw).is_err(), "accepted {raw:?}");
        }
    }
}
