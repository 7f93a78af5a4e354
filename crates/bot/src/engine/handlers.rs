//! Per-state handlers.
//!
//! Each handler receives the inbound event, runs its side effects, and
//! returns the next state. An event a handler has no transition for
//! re-renders the current prompt and stays put - at-least-once delivery
//! makes every arm safe to repeat.

use pronto_core::cart::{DELIVERY_ITEM_NAME, compose_cart_text};
use pronto_core::event::{CallbackPayload, InboundEvent};
use pronto_core::location::{Coordinate, CustomerLocation, DeliveryQuote};
use pronto_core::pricing::nearest_location;
use pronto_core::state::ConversationState;

use crate::commerce::Commerce;
use crate::error::EngineError;
use crate::geo::{GeoError, Locations};
use crate::store::StateStore;

use super::transport::ChatTransport;
use super::views::{
    CartView, DeliveryOptionsView, Invoice, MenuEntry, MenuView, PageInfo, PrecheckOutcome,
    PricedLine, ProductCard, format_minor,
};
use super::Engine;

const EMPTY_CART_TEXT: &str = "Your cart is empty";
const ADDRESS_NOT_RECOGNIZED_TEXT: &str = "Sorry, I can't make sense of that address";
const PRODUCT_DETAIL_HINT: &str = "Use the buttons to add the pizza or go back to the menu.";
const DELIVERY_OPTIONS_HINT: &str = "Delivery or pickup? Use the buttons above.";
const PAYMENT_HINT: &str = "Tap Pay to get your invoice.";
const PAYMENT_DECLINED_TEXT: &str = "Something went wrong. Please try the payment again.";
const PAYMENT_RECEIVED_TEXT: &str =
    "We received your payment and started making your pizza. A courier will deliver your order within an hour.";
const FOLLOW_UP_TEXT: &str =
    "Enjoy your pizza! If your order never arrived, reply here and we will sort it out.";

impl<C, L, S, T> Engine<C, L, S, T>
where
    C: Commerce,
    L: Locations,
    S: StateStore,
    T: ChatTransport + Clone + Send + Sync + 'static,
{
    // =========================================================================
    // Renderers (shared by several states)
    // =========================================================================

    pub(super) async fn show_menu(
        &self,
        user_key: &str,
        start: usize,
        category_id: Option<&str>,
    ) -> Result<ConversationState, EngineError> {
        let products = self.commerce.products(category_id).await?;
        let page = PageInfo::window(start, self.policy.page_size, products.len());

        let mut entries = Vec::with_capacity(page.end - page.start);
        for product in products.iter().skip(page.start).take(page.end - page.start) {
            let image_url = match &product.image_id {
                Some(file_id) => Some(self.commerce.image_url(file_id).await?),
                None => None,
            };
            entries.push(MenuEntry {
                product: product.clone(),
                image_url,
            });
        }

        let categories = self
            .commerce
            .categories()
            .await?
            .into_iter()
            .filter(|category| Some(category.id.as_str()) != category_id)
            .collect();

        let menu = MenuView {
            entries,
            page,
            categories,
            active_category: category_id.map(str::to_owned),
        };
        self.transport.send_menu(user_key, &menu).await?;
        Ok(ConversationState::Menu)
    }

    async fn show_product(
        &self,
        user_key: &str,
        product_id: &str,
    ) -> Result<ConversationState, EngineError> {
        let product = self.commerce.product(product_id).await?;
        let image_url = match &product.image_id {
            Some(file_id) => Some(self.commerce.image_url(file_id).await?),
            None => None,
        };

        let card = ProductCard { product, image_url };
        self.transport.send_product_card(user_key, &card).await?;
        Ok(ConversationState::ProductDetail)
    }

    async fn show_cart(&self, user_key: &str) -> Result<ConversationState, EngineError> {
        let cart = self.commerce.cart(user_key).await?;
        let view = CartView {
            text: compose_cart_text(&cart),
            cart,
        };
        self.transport.send_cart(user_key, &view).await?;
        Ok(ConversationState::Cart)
    }

    async fn show_delivery_options(
        &self,
        user_key: &str,
        customer: Coordinate,
    ) -> Result<ConversationState, EngineError> {
        let sites = self.locations.fulfillment_locations().await?;
        let (nearest, distance_km) =
            nearest_location(&sites, customer).ok_or(GeoError::NoFulfillmentLocations)?;

        let price_minor = self.policy.tiers.price_for_distance(distance_km);
        let view = DeliveryOptionsView {
            quote: DeliveryQuote {
                nearest: nearest.clone(),
                distance_km,
                price_minor,
            },
            customer,
            price_label: price_minor
                .map(|price| format_minor(price, &self.policy.currency)),
        };
        self.transport.send_delivery_options(user_key, &view).await?;
        Ok(ConversationState::DeliveryOptions)
    }

    async fn add_to_cart(&self, user_key: &str, product_id: &str) -> Result<(), EngineError> {
        self.commerce.add_cart_item(user_key, product_id, 1).await?;
        let name = self.commerce.product(product_id).await?.name;
        self.transport
            .toast(user_key, &format!("{name} added to your cart"))
            .await?;
        Ok(())
    }

    // =========================================================================
    // State handlers
    // =========================================================================

    pub(super) async fn handle_menu(
        &self,
        user_key: &str,
        event: InboundEvent,
    ) -> Result<ConversationState, EngineError> {
        match event {
            InboundEvent::MenuSelection(product_id) => {
                self.show_product(user_key, &product_id).await
            }
            InboundEvent::Postback(CallbackPayload::Page { start }) => {
                self.show_menu(user_key, start, None).await
            }
            InboundEvent::Postback(CallbackPayload::Category(category_id)) => {
                self.show_menu(user_key, 0, Some(&category_id)).await
            }
            InboundEvent::Postback(CallbackPayload::Cart) => self.show_cart(user_key).await,
            InboundEvent::Postback(CallbackPayload::AddToCart(product_id)) => {
                self.add_to_cart(user_key, &product_id).await?;
                Ok(ConversationState::Menu)
            }
            InboundEvent::Postback(CallbackPayload::Checkout) => {
                self.transport.request_location(user_key).await?;
                Ok(ConversationState::LocationRequest)
            }
            _ => self.show_menu(user_key, 0, None).await,
        }
    }

    pub(super) async fn handle_product_detail(
        &self,
        user_key: &str,
        event: InboundEvent,
    ) -> Result<ConversationState, EngineError> {
        match event {
            InboundEvent::Postback(CallbackPayload::Menu) => self.show_menu(user_key, 0, None).await,
            InboundEvent::Postback(CallbackPayload::AddToCart(product_id))
            | InboundEvent::MenuSelection(product_id) => {
                self.add_to_cart(user_key, &product_id).await?;
                Ok(ConversationState::ProductDetail)
            }
            _ => {
                self.transport.send_text(user_key, PRODUCT_DETAIL_HINT).await?;
                Ok(ConversationState::ProductDetail)
            }
        }
    }

    pub(super) async fn handle_cart(
        &self,
        user_key: &str,
        event: InboundEvent,
    ) -> Result<ConversationState, EngineError> {
        match event {
            InboundEvent::Postback(CallbackPayload::Menu) => self.show_menu(user_key, 0, None).await,
            InboundEvent::Postback(CallbackPayload::Checkout) => {
                self.transport.request_location(user_key).await?;
                Ok(ConversationState::LocationRequest)
            }
            InboundEvent::Postback(CallbackPayload::RemoveItem(item_id)) => {
                self.commerce.remove_cart_item(user_key, &item_id).await?;
                self.transport.toast(user_key, "Removed from your cart").await?;
                self.show_cart(user_key).await
            }
            InboundEvent::Postback(CallbackPayload::AddToCart(product_id)) => {
                self.add_to_cart(user_key, &product_id).await?;
                self.show_cart(user_key).await
            }
            _ => self.show_cart(user_key).await,
        }
    }

    pub(super) async fn handle_location_request(
        &self,
        user_key: &str,
        event: InboundEvent,
    ) -> Result<ConversationState, EngineError> {
        match event {
            InboundEvent::LocationShared {
                longitude,
                latitude,
            } => {
                self.show_delivery_options(user_key, Coordinate::new(longitude, latitude))
                    .await
            }
            InboundEvent::TextMessage(address) => {
                match self.locations.geocode(&address).await? {
                    Some(coordinate) => self.show_delivery_options(user_key, coordinate).await,
                    None => {
                        self.transport
                            .send_text(user_key, ADDRESS_NOT_RECOGNIZED_TEXT)
                            .await?;
                        Ok(ConversationState::LocationRequest)
                    }
                }
            }
            _ => {
                self.transport.request_location(user_key).await?;
                Ok(ConversationState::LocationRequest)
            }
        }
    }

    pub(super) async fn handle_delivery_options(
        &self,
        user_key: &str,
        event: InboundEvent,
    ) -> Result<ConversationState, EngineError> {
        match event {
            InboundEvent::Postback(CallbackPayload::Delivery {
                price_minor,
                longitude,
                latitude,
            }) => {
                self.order_delivery(user_key, price_minor, Coordinate::new(longitude, latitude))
                    .await
            }
            InboundEvent::Postback(CallbackPayload::Pickup(location_id)) => {
                let site = self.locations.fulfillment_location(&location_id).await?;
                self.transport
                    .send_text(
                        user_key,
                        &format!(
                            "You can pick your order up at {}. Thank you for your order!",
                            site.address
                        ),
                    )
                    .await?;
                Ok(ConversationState::Finish)
            }
            InboundEvent::Postback(CallbackPayload::ChangeAddress) => {
                self.transport.request_location(user_key).await?;
                Ok(ConversationState::LocationRequest)
            }
            _ => {
                self.transport.send_text(user_key, DELIVERY_OPTIONS_HINT).await?;
                Ok(ConversationState::DeliveryOptions)
            }
        }
    }

    async fn order_delivery(
        &self,
        user_key: &str,
        price_minor: i64,
        customer: Coordinate,
    ) -> Result<ConversationState, EngineError> {
        self.locations
            .record_customer_location(&CustomerLocation {
                customer_id: user_key.to_owned(),
                coordinate: customer,
                delivery_price_minor: price_minor,
                created_at: None,
            })
            .await?;
        self.commerce.ensure_delivery_line(user_key, price_minor).await?;

        let cart = self.commerce.cart(user_key).await?;
        let cart_text = compose_cart_text(&cart).unwrap_or_else(|| EMPTY_CART_TEXT.to_owned());
        self.transport
            .send_payment_prompt(
                user_key,
                &format!("We'll deliver your pizza within an hour of payment.\n\n{cart_text}"),
            )
            .await?;
        Ok(ConversationState::WaitingPayment)
    }

    pub(super) async fn handle_waiting_payment(
        &self,
        user_key: &str,
        event: InboundEvent,
    ) -> Result<ConversationState, EngineError> {
        match event {
            InboundEvent::Postback(CallbackPayload::Pay) => {
                let invoice = self.build_invoice(user_key).await?;
                self.transport.send_invoice(user_key, &invoice).await?;
                Ok(ConversationState::WaitingPayment)
            }
            InboundEvent::PaymentPrecheck { query_id, payload } => {
                if payload == self.policy.order_payload {
                    self.transport
                        .answer_precheck(&query_id, PrecheckOutcome::Approve)
                        .await?;
                    Ok(ConversationState::WaitingPayment)
                } else {
                    self.transport
                        .answer_precheck(
                            &query_id,
                            PrecheckOutcome::Decline {
                                message: PAYMENT_DECLINED_TEXT.to_owned(),
                            },
                        )
                        .await?;
                    Err(EngineError::PaymentPayloadMismatch { got: payload })
                }
            }
            InboundEvent::PaymentCompleted => self.finalize_order(user_key).await,
            _ => {
                self.transport.send_text(user_key, PAYMENT_HINT).await?;
                Ok(ConversationState::WaitingPayment)
            }
        }
    }

    async fn build_invoice(&self, user_key: &str) -> Result<Invoice, EngineError> {
        let cart = self.commerce.cart(user_key).await?;
        let mut lines: Vec<PricedLine> = cart
            .product_lines()
            .map(|line| PricedLine {
                label: format!("{}, {} pcs", line.name, line.quantity),
                amount_minor: line.unit_price_minor * i64::from(line.quantity),
            })
            .collect();
        if let Some(delivery) = cart.delivery_line() {
            lines.push(PricedLine {
                label: DELIVERY_ITEM_NAME.to_owned(),
                amount_minor: delivery.unit_price_minor * i64::from(delivery.quantity),
            });
        }

        Ok(Invoice {
            title: format!("Order {user_key}"),
            description: "Pizza".to_owned(),
            payload: self.policy.order_payload.clone(),
            currency: self.policy.currency.clone(),
            lines,
        })
    }

    /// Courier handoff and confirmation after a captured payment.
    async fn finalize_order(&self, user_key: &str) -> Result<ConversationState, EngineError> {
        let location = self
            .locations
            .latest_customer_location(user_key)
            .await?
            .ok_or_else(|| {
                EngineError::InvalidInput(format!(
                    "payment completed for {user_key} with no recorded delivery location"
                ))
            })?;

        let sites = self.locations.fulfillment_locations().await?;
        let (nearest, _) = nearest_location(&sites, location.coordinate)
            .ok_or(GeoError::NoFulfillmentLocations)?;

        let cart = self.commerce.cart(user_key).await?;
        let cart_text = compose_cart_text(&cart).unwrap_or_else(|| EMPTY_CART_TEXT.to_owned());

        self.transport
            .send_text(
                &nearest.courier_channel_id,
                &format!("Order {user_key}\n\n{cart_text}\n\nORDER PAID"),
            )
            .await?;
        self.transport
            .send_location(&nearest.courier_channel_id, location.coordinate)
            .await?;
        self.transport.send_text(user_key, PAYMENT_RECEIVED_TEXT).await?;

        self.schedule_follow_up(user_key);
        Ok(ConversationState::Finish)
    }

    /// Fire-and-forget delayed follow-up. Lost if the process restarts
    /// before it fires, which is acceptable.
    fn schedule_follow_up(&self, user_key: &str) {
        let transport = self.transport.clone();
        let user_key = user_key.to_owned();
        let delay = self.policy.confirmation_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = transport.send_text(&user_key, FOLLOW_UP_TEXT).await {
                tracing::warn!(user = %user_key, error = %err, "follow-up message failed");
            }
        });
    }
}
