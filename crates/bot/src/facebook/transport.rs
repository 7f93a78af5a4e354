//! Messenger adapter: decodes webhook events, renders engine views.
//!
//! Messenger has no inline keyboards, message editing, or native invoices;
//! menus and carts render as generic-template galleries, decision screens
//! as button templates, and invoices as itemized text.

use async_trait::async_trait;
use tracing::{debug, warn};

use pronto_core::event::{CallbackPayload, InboundEvent};
use pronto_core::location::Coordinate;

use crate::engine::transport::{ChatTransport, TransportError};
use crate::engine::views::{
    CartView, DeliveryOptionsView, Invoice, MenuView, PrecheckOutcome, ProductCard, format_minor,
};

use super::FacebookError;
use super::client::FacebookClient;
use super::types::{GenericElement, MessagingEvent, PostbackButton};

/// Namespace prefix for Facebook user keys in the state store.
pub const FACEBOOK_USER_PREFIX: &str = "facebook:";

const LOCATION_PROMPT: &str = "Send your address or share a location";

/// Messenger caps a gallery at ten cards and a card at three buttons.
const MAX_GALLERY_CARDS: usize = 10;
const MAX_CARD_BUTTONS: usize = 3;

/// The Messenger side of the conversation.
#[derive(Debug, Clone)]
pub struct FacebookTransport {
    client: FacebookClient,
}

impl FacebookTransport {
    #[must_use]
    pub const fn new(client: FacebookClient) -> Self {
        Self { client }
    }

    /// Decode one messaging event into a `(user key, event)` pair.
    ///
    /// Unparseable postback payloads come back as text so the current
    /// state handler re-prompts.
    #[must_use]
    pub fn decode(event: MessagingEvent) -> Option<(String, InboundEvent)> {
        let key = format!("{FACEBOOK_USER_PREFIX}{}", event.sender.id);

        if let Some(postback) = event.postback {
            let inbound = match CallbackPayload::parse(&postback.payload) {
                Ok(CallbackPayload::Product(product_id)) => {
                    InboundEvent::MenuSelection(product_id)
                }
                Ok(payload) => InboundEvent::Postback(payload),
                Err(err) => {
                    warn!(user = %key, error = %err, "unparseable postback payload");
                    InboundEvent::TextMessage(postback.payload)
                }
            };
            return Some((key, inbound));
        }

        let message = event.message?;
        for attachment in &message.attachments {
            if attachment.kind == "location"
                && let Some(coordinates) =
                    attachment.payload.as_ref().and_then(|p| p.coordinates)
            {
                return Some((
                    key,
                    InboundEvent::LocationShared {
                        longitude: coordinates.lon,
                        latitude: coordinates.lat,
                    },
                ));
            }
        }
        message
            .text
            .map(|text| (key, InboundEvent::TextMessage(text)))
    }

    fn recipient(user_key: &str) -> &str {
        user_key
            .strip_prefix(FACEBOOK_USER_PREFIX)
            .unwrap_or(user_key)
    }
}

fn postback(title: impl Into<String>, payload: &CallbackPayload) -> PostbackButton {
    PostbackButton::new(title, payload.encode())
}

impl From<FacebookError> for TransportError {
    fn from(err: FacebookError) -> Self {
        Self::Send(err.to_string())
    }
}

#[async_trait]
impl ChatTransport for FacebookTransport {
    async fn send_text(&self, user_key: &str, text: &str) -> Result<(), TransportError> {
        self.client
            .send_text(Self::recipient(user_key), text)
            .await?;
        Ok(())
    }

    async fn send_menu(&self, user_key: &str, menu: &MenuView) -> Result<(), TransportError> {
        let mut action_buttons = vec![
            postback("🛒 Cart", &CallbackPayload::Cart),
            postback("Checkout", &CallbackPayload::Checkout),
        ];
        if menu.page.has_next() {
            action_buttons.push(postback(
                "More pizzas",
                &CallbackPayload::Page {
                    start: menu.page.next_start(),
                },
            ));
        }

        let mut elements = vec![GenericElement {
            title: "Menu".to_owned(),
            subtitle: Some("Pick a pizza, or open your cart".to_owned()),
            image_url: None,
            buttons: action_buttons,
        }];

        for entry in &menu.entries {
            let product = &entry.product;
            elements.push(GenericElement {
                title: format!("{} - {}", product.name, product.price_formatted),
                subtitle: Some(product.description.clone()),
                image_url: entry.image_url.clone(),
                buttons: vec![
                    postback(
                        "Add to cart",
                        &CallbackPayload::AddToCart(product.id.clone()),
                    ),
                    postback("Details", &CallbackPayload::Product(product.id.clone())),
                ],
            });
        }

        if !menu.categories.is_empty() {
            elements.push(GenericElement {
                title: "Looking for something else?".to_owned(),
                subtitle: Some("The rest of the menu lives in other categories".to_owned()),
                image_url: None,
                buttons: menu
                    .categories
                    .iter()
                    .take(MAX_CARD_BUTTONS)
                    .map(|category| {
                        postback(
                            &category.name,
                            &CallbackPayload::Category(category.id.clone()),
                        )
                    })
                    .collect(),
            });
        }

        elements.truncate(MAX_GALLERY_CARDS);
        self.client
            .send_gallery(Self::recipient(user_key), &elements)
            .await?;
        Ok(())
    }

    async fn send_product_card(
        &self,
        user_key: &str,
        card: &ProductCard,
    ) -> Result<(), TransportError> {
        let product = &card.product;
        let element = GenericElement {
            title: format!("{} - {}", product.name, product.price_formatted),
            subtitle: Some(product.description.clone()),
            image_url: card.image_url.clone(),
            buttons: vec![
                postback(
                    "Add to cart",
                    &CallbackPayload::AddToCart(product.id.clone()),
                ),
                postback("Back", &CallbackPayload::Menu),
            ],
        };
        self.client
            .send_gallery(Self::recipient(user_key), &[element])
            .await?;
        Ok(())
    }

    async fn send_cart(&self, user_key: &str, view: &CartView) -> Result<(), TransportError> {
        let recipient = Self::recipient(user_key);

        if view.text.is_none() {
            self.client
                .send_buttons(
                    recipient,
                    "Your cart is empty",
                    &[postback("To the menu", &CallbackPayload::Menu)],
                )
                .await?;
            return Ok(());
        }

        let mut elements = vec![GenericElement {
            title: format!("Your order, {} total", view.cart.total_formatted),
            subtitle: None,
            image_url: None,
            buttons: vec![
                postback("To the menu", &CallbackPayload::Menu),
                postback("Checkout", &CallbackPayload::Checkout),
            ],
        }];

        for line in view.cart.product_lines() {
            let mut buttons = Vec::new();
            if let Some(product_id) = &line.product_id {
                buttons.push(postback(
                    "Add one more",
                    &CallbackPayload::AddToCart(product_id.clone()),
                ));
            }
            buttons.push(postback(
                "Remove from cart",
                &CallbackPayload::RemoveItem(line.item_id.clone()),
            ));

            elements.push(GenericElement {
                title: format!("{}, {} pcs", line.name, line.quantity),
                subtitle: line.description.clone(),
                image_url: line.image_url.clone(),
                buttons,
            });
        }

        elements.truncate(MAX_GALLERY_CARDS);
        self.client.send_gallery(recipient, &elements).await?;
        Ok(())
    }

    async fn request_location(&self, user_key: &str) -> Result<(), TransportError> {
        self.client
            .send_text(Self::recipient(user_key), LOCATION_PROMPT)
            .await?;
        Ok(())
    }

    async fn send_delivery_options(
        &self,
        user_key: &str,
        view: &DeliveryOptionsView,
    ) -> Result<(), TransportError> {
        let quote = &view.quote;
        let address = &quote.nearest.address;

        let mut buttons = Vec::new();
        let text = match (quote.price_minor, &view.price_label) {
            (None, _) => format!(
                "Sorry, that's too far for delivery - the nearest pizzeria is {:.0} km away. \
                 You can pick your order up at {address}",
                quote.distance_km
            ),
            (Some(price_minor), label) => {
                let button_title = match (price_minor, label) {
                    (0, _) => "Free delivery".to_owned(),
                    (_, Some(label)) => format!("Delivery for {label}"),
                    (_, None) => "Delivery".to_owned(),
                };
                buttons.push(postback(
                    button_title,
                    &CallbackPayload::Delivery {
                        price_minor,
                        longitude: view.customer.longitude,
                        latitude: view.customer.latitude,
                    },
                ));
                format!("Delivery or pickup? The nearest pizzeria is at {address}.")
            }
        };

        buttons.push(postback(
            "Pickup",
            &CallbackPayload::Pickup(quote.nearest.id.clone()),
        ));
        if buttons.len() < MAX_CARD_BUTTONS {
            buttons.push(postback("A different address", &CallbackPayload::ChangeAddress));
        }

        self.client
            .send_buttons(Self::recipient(user_key), &text, &buttons)
            .await?;
        Ok(())
    }

    async fn send_payment_prompt(
        &self,
        user_key: &str,
        text: &str,
    ) -> Result<(), TransportError> {
        self.client
            .send_buttons(
                Self::recipient(user_key),
                text,
                &[postback("💳 Pay", &CallbackPayload::Pay)],
            )
            .await?;
        Ok(())
    }

    async fn send_invoice(
        &self,
        user_key: &str,
        invoice: &Invoice,
    ) -> Result<(), TransportError> {
        // No native invoices on Messenger; render the itemization as text.
        let total: i64 = invoice.lines.iter().map(|line| line.amount_minor).sum();
        let mut rows = vec![invoice.title.clone(), invoice.description.clone()];
        rows.extend(invoice.lines.iter().map(|line| {
            format!(
                "{} - {}",
                line.label,
                format_minor(line.amount_minor, &invoice.currency)
            )
        }));
        rows.push(format!("Total due: {}", format_minor(total, &invoice.currency)));

        self.client
            .send_text(Self::recipient(user_key), &rows.join("\n"))
            .await?;
        Ok(())
    }

    async fn answer_precheck(
        &self,
        query_id: &str,
        _outcome: PrecheckOutcome,
    ) -> Result<(), TransportError> {
        // Messenger has no pre-charge round-trip; nothing to answer.
        debug!(query_id = %query_id, "precheck answer ignored on Messenger");
        Ok(())
    }

    async fn send_location(
        &self,
        channel_id: &str,
        coordinate: Coordinate,
    ) -> Result<(), TransportError> {
        let text = format!(
            "Customer location: {}, {}\nhttps://maps.google.com/?q={},{}",
            coordinate.latitude, coordinate.longitude, coordinate.latitude, coordinate.longitude
        );
        self.client
            .send_text(Self::recipient(channel_id), &text)
            .await?;
        Ok(())
    }

    async fn toast(&self, user_key: &str, text: &str) -> Result<(), TransportError> {
        self.client
            .send_text(Self::recipient(user_key), text)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(raw: serde_json::Value) -> MessagingEvent {
        serde_json::from_value(raw).expect("fixture parses")
    }

    #[test]
    fn test_decode_postback() {
        let (key, inbound) = FacebookTransport::decode(event(serde_json::json!({
            "sender": { "id": "777" },
            "postback": { "payload": "cart" }
        })))
        .expect("decodes");
        assert_eq!(key, "facebook:777");
        assert_eq!(inbound, InboundEvent::Postback(CallbackPayload::Cart));
    }

    #[test]
    fn test_decode_product_postback_is_menu_selection() {
        let (_, inbound) = FacebookTransport::decode(event(serde_json::json!({
            "sender": { "id": "777" },
            "postback": { "payload": "product:prod-9" }
        })))
        .expect("decodes");
        assert_eq!(inbound, InboundEvent::MenuSelection("prod-9".to_owned()));
    }

    #[test]
    fn test_decode_text_message() {
        let (_, inbound) = FacebookTransport::decode(event(serde_json::json!({
            "sender": { "id": "777" },
            "message": { "text": "/start" }
        })))
        .expect("decodes");
        assert_eq!(inbound, InboundEvent::TextMessage("/start".to_owned()));
    }

    #[test]
    fn test_decode_shared_location_attachment() {
        let (_, inbound) = FacebookTransport::decode(event(serde_json::json!({
            "sender": { "id": "777" },
            "message": {
                "attachments": [{
                    "type": "location",
                    "payload": { "coordinates": { "lat": 55.75, "long": 37.62 } }
                }]
            }
        })))
        .expect("decodes");
        assert_eq!(
            inbound,
            InboundEvent::LocationShared {
                longitude: 37.62,
                latitude: 55.75
            }
        );
    }

    #[test]
    fn test_decode_unknown_postback_falls_back_to_text() {
        let (_, inbound) = FacebookTransport::decode(event(serde_json::json!({
            "sender": { "id": "777" },
            "postback": { "payload": "add_to_cart~legacy" }
        })))
        .expect("decodes");
        assert_eq!(
            inbound,
            InboundEvent::TextMessage("add_to_cart~legacy".to_owned())
        );
    }

    #[test]
    fn test_decode_empty_message_is_none() {
        assert!(
            FacebookTransport::decode(event(serde_json::json!({
                "sender": { "id": "777" },
                "message": {}
            })))
            .is_none()
        );
    }
}
