//! Telegram adapter: decodes updates, renders engine views.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::warn;

use pronto_core::event::{CallbackPayload, InboundEvent};
use pronto_core::location::Coordinate;

use crate::engine::transport::{ChatTransport, TransportError};
use crate::engine::views::{
    CartView, DeliveryOptionsView, Invoice, MenuView, PrecheckOutcome, ProductCard,
};

use super::client::TelegramClient;
use super::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, LabeledPrice, Update,
};
use super::TelegramError;

/// Namespace prefix for Telegram user keys in the state store.
pub const TELEGRAM_USER_PREFIX: &str = "telegram:";

const LOCATION_PROMPT: &str = "Send your address or share a location";

/// Payment provider settings for invoices.
#[derive(Clone)]
pub struct TelegramPaymentConfig {
    pub provider_token: SecretString,
    pub start_parameter: String,
}

impl std::fmt::Debug for TelegramPaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramPaymentConfig")
            .field("provider_token", &"[REDACTED]")
            .field("start_parameter", &self.start_parameter)
            .finish()
    }
}

/// Transient per-chat UI context.
///
/// Telegram edits and deletes address concrete message ids, and callback
/// acknowledgements address the pending query. Both are platform details
/// the engine never sees; the adapter tracks them here, keyed by chat.
#[derive(Debug, Default, Clone)]
struct ChatContext {
    last_message_id: Option<i64>,
    pending_callback: Option<String>,
}

/// The Telegram side of the conversation.
#[derive(Clone)]
pub struct TelegramTransport {
    client: TelegramClient,
    payment: TelegramPaymentConfig,
    chats: Arc<Mutex<HashMap<i64, ChatContext>>>,
}

impl TelegramTransport {
    #[must_use]
    pub fn new(client: TelegramClient, payment: TelegramPaymentConfig) -> Self {
        Self {
            client,
            payment,
            chats: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Decode one update into a `(user key, event)` pair.
    ///
    /// Returns `None` for update kinds this bot does not consume. Button
    /// payloads that fail to parse come back as text so the current state
    /// handler re-prompts instead of the event being dropped on the floor.
    #[must_use]
    pub fn decode(&self, update: Update) -> Option<(String, InboundEvent)> {
        if let Some(query) = update.pre_checkout_query {
            return Some((
                user_key(query.from.id),
                InboundEvent::PaymentPrecheck {
                    query_id: query.id,
                    payload: query.invoice_payload,
                },
            ));
        }

        if let Some(callback) = update.callback_query {
            let data = callback.data?;
            let chat_id = callback
                .message
                .as_ref()
                .map_or(callback.from.id, |message| message.chat.id);

            let mut chats = self.lock_chats();
            let context = chats.entry(chat_id).or_default();
            context.pending_callback = Some(callback.id);
            context.last_message_id = callback.message.map(|message| message.message_id);
            drop(chats);

            let event = match CallbackPayload::parse(&data) {
                Ok(CallbackPayload::Product(product_id)) => {
                    InboundEvent::MenuSelection(product_id)
                }
                Ok(payload) => InboundEvent::Postback(payload),
                Err(err) => {
                    warn!(chat_id = chat_id, error = %err, "unparseable callback payload");
                    InboundEvent::TextMessage(data)
                }
            };
            return Some((user_key(chat_id), event));
        }

        let message = update.message?;
        let key = user_key(message.chat.id);
        if message.successful_payment.is_some() {
            return Some((key, InboundEvent::PaymentCompleted));
        }
        if let Some(location) = message.location {
            return Some((
                key,
                InboundEvent::LocationShared {
                    longitude: location.longitude,
                    latitude: location.latitude,
                },
            ));
        }
        message
            .text
            .map(|text| (key, InboundEvent::TextMessage(text)))
    }

    fn lock_chats(&self) -> std::sync::MutexGuard<'_, HashMap<i64, ChatContext>> {
        self.chats
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn chat_id(user_key: &str) -> Result<i64, TransportError> {
        user_key
            .strip_prefix(TELEGRAM_USER_PREFIX)
            .unwrap_or(user_key)
            .parse()
            .map_err(|_| TransportError::BadChatRef(user_key.to_owned()))
    }

    fn remember_message(&self, chat_id: i64, message_id: i64) {
        self.lock_chats().entry(chat_id).or_default().last_message_id = Some(message_id);
    }

    fn take_last_message(&self, chat_id: i64) -> Option<i64> {
        self.lock_chats()
            .entry(chat_id)
            .or_default()
            .last_message_id
            .take()
    }

    fn take_pending_callback(&self, chat_id: i64) -> Option<String> {
        self.lock_chats()
            .entry(chat_id)
            .or_default()
            .pending_callback
            .take()
    }

    /// Replace the previous bot message: delete it if we know it, then send
    /// fresh. Deletion failures are expected (too old, already gone) and
    /// only logged.
    async fn replace_with_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        if let Some(message_id) = self.take_last_message(chat_id)
            && let Err(err) = self.client.delete_message(chat_id, message_id).await
        {
            warn!(chat_id = chat_id, error = %err, "could not delete previous message");
        }
        let message = self.client.send_message(chat_id, text, markup).await?;
        self.remember_message(chat_id, message.message_id);
        Ok(())
    }

    /// Edit the previous bot message in place, falling back to a fresh
    /// message when there is nothing to edit (or the edit is rejected).
    async fn edit_or_send(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let last = self.lock_chats().entry(chat_id).or_default().last_message_id;
        if let Some(message_id) = last {
            match self
                .client
                .edit_message_text(chat_id, message_id, text, markup)
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(chat_id = chat_id, error = %err, "edit failed, sending new message");
                }
            }
        }
        let message = self.client.send_message(chat_id, text, markup).await?;
        self.remember_message(chat_id, message.message_id);
        Ok(())
    }
}

fn user_key(chat_id: i64) -> String {
    format!("{TELEGRAM_USER_PREFIX}{chat_id}")
}

fn button(text: impl Into<String>, payload: &CallbackPayload) -> InlineKeyboardButton {
    InlineKeyboardButton::new(text, payload.encode())
}

impl From<TelegramError> for TransportError {
    fn from(err: TelegramError) -> Self {
        Self::Send(err.to_string())
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, user_key: &str, text: &str) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(user_key)?;
        self.client.send_message(chat_id, text, None).await?;
        Ok(())
    }

    async fn send_menu(&self, user_key: &str, menu: &MenuView) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(user_key)?;

        let mut keyboard: Vec<Vec<InlineKeyboardButton>> = menu
            .entries
            .iter()
            .map(|entry| {
                vec![button(
                    &entry.product.name,
                    &CallbackPayload::Product(entry.product.id.clone()),
                )]
            })
            .collect();

        let mut nav = Vec::new();
        if menu.page.has_previous() {
            nav.push(button(
                "⬅ Back",
                &CallbackPayload::Page {
                    start: menu.page.previous_start(),
                },
            ));
        }
        if menu.page.has_next() {
            nav.push(button(
                "Forward ➡",
                &CallbackPayload::Page {
                    start: menu.page.next_start(),
                },
            ));
        }
        if !nav.is_empty() {
            keyboard.push(nav);
        }
        keyboard.push(vec![button("🛒 Cart", &CallbackPayload::Cart)]);

        let markup = InlineKeyboardMarkup {
            inline_keyboard: keyboard,
        };
        self.replace_with_message(chat_id, "Menu:", Some(&markup))
            .await?;
        Ok(())
    }

    async fn send_product_card(
        &self,
        user_key: &str,
        card: &ProductCard,
    ) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(user_key)?;
        let product = &card.product;
        let caption = format!(
            "{}\nPrice {}\n\n{}",
            product.name, product.price_formatted, product.description
        );
        let markup = InlineKeyboardMarkup {
            inline_keyboard: vec![
                vec![button(
                    "Add to cart",
                    &CallbackPayload::AddToCart(product.id.clone()),
                )],
                vec![button("Back", &CallbackPayload::Menu)],
            ],
        };

        if let Some(message_id) = self.take_last_message(chat_id)
            && let Err(err) = self.client.delete_message(chat_id, message_id).await
        {
            warn!(chat_id = chat_id, error = %err, "could not delete previous message");
        }

        let message = match &card.image_url {
            Some(url) => {
                self.client
                    .send_photo(chat_id, url, &caption, Some(&markup))
                    .await?
            }
            None => {
                self.client
                    .send_message(chat_id, &caption, Some(&markup))
                    .await?
            }
        };
        self.remember_message(chat_id, message.message_id);
        Ok(())
    }

    async fn send_cart(&self, user_key: &str, view: &CartView) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(user_key)?;

        let mut keyboard = vec![vec![button("In the menu", &CallbackPayload::Menu)]];
        let text = match &view.text {
            Some(text) => {
                for line in view.cart.product_lines() {
                    keyboard.push(vec![button(
                        format!("Remove {}", line.name),
                        &CallbackPayload::RemoveItem(line.item_id.clone()),
                    )]);
                }
                keyboard.push(vec![button("Checkout", &CallbackPayload::Checkout)]);
                text.clone()
            }
            None => "Your cart is empty".to_owned(),
        };

        let markup = InlineKeyboardMarkup {
            inline_keyboard: keyboard,
        };
        self.edit_or_send(chat_id, &text, Some(&markup)).await?;
        Ok(())
    }

    async fn request_location(&self, user_key: &str) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(user_key)?;
        self.edit_or_send(chat_id, LOCATION_PROMPT, None).await?;
        Ok(())
    }

    async fn send_delivery_options(
        &self,
        user_key: &str,
        view: &DeliveryOptionsView,
    ) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(user_key)?;
        let quote = &view.quote;
        let address = &quote.nearest.address;

        let mut keyboard = Vec::new();
        let text = match (quote.price_minor, &view.price_label) {
            (None, _) => format!(
                "Sorry, that's too far for delivery - the nearest pizzeria is {:.0} km away.\n\n\
                 You can pick your order up yourself at {address}",
                quote.distance_km
            ),
            (Some(0), _) => {
                keyboard.push(vec![button(
                    "Free delivery",
                    &CallbackPayload::Delivery {
                        price_minor: 0,
                        longitude: view.customer.longitude,
                        latitude: view.customer.latitude,
                    },
                )]);
                format!(
                    "How about picking your pizza up from our pizzeria nearby? \
                     It's only {:.0} metres from you - at {address}.\n\n\
                     Or we can deliver it for free, no trouble at all.",
                    quote.distance_km * 1_000.0
                )
            }
            (Some(price_minor), Some(label)) => {
                keyboard.push(vec![button(
                    format!("Delivery for {label}"),
                    &CallbackPayload::Delivery {
                        price_minor,
                        longitude: view.customer.longitude,
                        latitude: view.customer.latitude,
                    },
                )]);
                format!(
                    "Looks like we're riding out to you. Delivery will cost {label}.\n\n\
                     You can also pick your order up at {address}.\n\n\
                     Delivery or pickup?"
                )
            }
            (Some(price_minor), None) => {
                // price_label is always set with a price; keep a sane fallback.
                keyboard.push(vec![button(
                    "Delivery",
                    &CallbackPayload::Delivery {
                        price_minor,
                        longitude: view.customer.longitude,
                        latitude: view.customer.latitude,
                    },
                )]);
                format!("Delivery or pickup? The pizzeria is at {address}.")
            }
        };

        keyboard.push(vec![button(
            "Pickup",
            &CallbackPayload::Pickup(quote.nearest.id.clone()),
        )]);
        keyboard.push(vec![button(
            "A different address",
            &CallbackPayload::ChangeAddress,
        )]);

        let markup = InlineKeyboardMarkup {
            inline_keyboard: keyboard,
        };
        let message = self
            .client
            .send_message(chat_id, &text, Some(&markup))
            .await?;
        self.remember_message(chat_id, message.message_id);
        Ok(())
    }

    async fn send_payment_prompt(
        &self,
        user_key: &str,
        text: &str,
    ) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(user_key)?;
        let markup = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![button("💳 Pay", &CallbackPayload::Pay)]],
        };
        self.edit_or_send(chat_id, text, Some(&markup)).await?;
        Ok(())
    }

    async fn send_invoice(
        &self,
        user_key: &str,
        invoice: &Invoice,
    ) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(user_key)?;
        let prices: Vec<LabeledPrice> = invoice
            .lines
            .iter()
            .map(|line| LabeledPrice {
                label: line.label.clone(),
                amount: line.amount_minor,
            })
            .collect();

        self.client
            .send_invoice(
                chat_id,
                &invoice.title,
                &invoice.description,
                &invoice.payload,
                &self.payment.provider_token,
                &self.payment.start_parameter,
                &invoice.currency,
                &prices,
            )
            .await?;
        Ok(())
    }

    async fn answer_precheck(
        &self,
        query_id: &str,
        outcome: PrecheckOutcome,
    ) -> Result<(), TransportError> {
        match outcome {
            PrecheckOutcome::Approve => {
                self.client
                    .answer_pre_checkout_query(query_id, true, None)
                    .await?;
            }
            PrecheckOutcome::Decline { message } => {
                self.client
                    .answer_pre_checkout_query(query_id, false, Some(&message))
                    .await?;
            }
        }
        Ok(())
    }

    async fn send_location(
        &self,
        channel_id: &str,
        coordinate: Coordinate,
    ) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(channel_id)?;
        self.client
            .send_location(chat_id, coordinate.latitude, coordinate.longitude)
            .await?;
        Ok(())
    }

    async fn toast(&self, user_key: &str, text: &str) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(user_key)?;
        if let Some(callback_id) = self.take_pending_callback(chat_id) {
            self.client
                .answer_callback_query(&callback_id, text)
                .await?;
        } else {
            self.client.send_message(chat_id, text, None).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> TelegramTransport {
        TelegramTransport::new(
            TelegramClient::new(SecretString::from("123:test-token")),
            TelegramPaymentConfig {
                provider_token: SecretString::from("pay-token"),
                start_parameter: "pizza".to_owned(),
            },
        )
    }

    fn update(raw: serde_json::Value) -> Update {
        serde_json::from_value(raw).expect("fixture parses")
    }

    #[test]
    fn test_decode_text_message() {
        let (key, event) = transport()
            .decode(update(serde_json::json!({
                "update_id": 1,
                "message": {
                    "message_id": 10,
                    "chat": { "id": 42 },
                    "text": "/start"
                }
            })))
            .expect("decodes");
        assert_eq!(key, "telegram:42");
        assert_eq!(event, InboundEvent::TextMessage("/start".to_owned()));
    }

    #[test]
    fn test_decode_shared_location() {
        let (_, event) = transport()
            .decode(update(serde_json::json!({
                "update_id": 2,
                "message": {
                    "message_id": 11,
                    "chat": { "id": 42 },
                    "location": { "longitude": 37.62, "latitude": 55.75 }
                }
            })))
            .expect("decodes");
        assert_eq!(
            event,
            InboundEvent::LocationShared {
                longitude: 37.62,
                latitude: 55.75
            }
        );
    }

    #[test]
    fn test_decode_product_button_is_menu_selection() {
        let (key, event) = transport()
            .decode(update(serde_json::json!({
                "update_id": 3,
                "callback_query": {
                    "id": "cb-1",
                    "from": { "id": 42 },
                    "message": { "message_id": 12, "chat": { "id": 42 } },
                    "data": "product:prod-1"
                }
            })))
            .expect("decodes");
        assert_eq!(key, "telegram:42");
        assert_eq!(event, InboundEvent::MenuSelection("prod-1".to_owned()));
    }

    #[test]
    fn test_decode_unknown_payload_falls_back_to_text() {
        let (_, event) = transport()
            .decode(update(serde_json::json!({
                "update_id": 4,
                "callback_query": {
                    "id": "cb-2",
                    "from": { "id": 42 },
                    "message": { "message_id": 13, "chat": { "id": 42 } },
                    "data": "bogus~stuff"
                }
            })))
            .expect("decodes");
        assert_eq!(event, InboundEvent::TextMessage("bogus~stuff".to_owned()));
    }

    #[test]
    fn test_decode_precheck_and_payment() {
        let transport = transport();
        let (_, precheck) = transport
            .decode(update(serde_json::json!({
                "update_id": 5,
                "pre_checkout_query": {
                    "id": "pq-1",
                    "from": { "id": 42 },
                    "invoice_payload": "pizza-order"
                }
            })))
            .expect("decodes");
        assert_eq!(
            precheck,
            InboundEvent::PaymentPrecheck {
                query_id: "pq-1".to_owned(),
                payload: "pizza-order".to_owned()
            }
        );

        let (_, paid) = transport
            .decode(update(serde_json::json!({
                "update_id": 6,
                "message": {
                    "message_id": 14,
                    "chat": { "id": 42 },
                    "successful_payment": {
                        "currency": "RUB",
                        "total_amount": 90_000,
                        "invoice_payload": "pizza-order"
                    }
                }
            })))
            .expect("decodes");
        assert_eq!(paid, InboundEvent::PaymentCompleted);
    }

    #[test]
    fn test_chat_id_accepts_prefixed_and_raw_keys() {
        assert_eq!(
            TelegramTransport::chat_id("telegram:42").expect("prefixed"),
            42
        );
        assert_eq!(TelegramTransport::chat_id("42").expect("raw"), 42);
        assert!(TelegramTransport::chat_id("facebook:42x").is_err());
    }
}
