//! In-memory fakes for the engine's four collaborator seams.
//!
//! The fakes model just enough of the real collaborators for end-to-end
//! conversation scenarios: the commerce fake merges repeated product lines
//! the way the real cart service does, the locations fake replays a canned
//! geocode table, and the transport fake records every outbound call for
//! assertions.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use pronto_bot::commerce::{Commerce, CommerceError};
use pronto_bot::engine::transport::{ChatTransport, TransportError};
use pronto_bot::engine::views::{
    CartView, DeliveryOptionsView, Invoice, MenuView, PrecheckOutcome, ProductCard,
};
use pronto_bot::geo::{GeoError, Locations};
use pronto_core::cart::{CartLine, CartSummary};
use pronto_core::catalog::{Category, Product};
use pronto_core::location::{Coordinate, CustomerLocation, FulfillmentLocation};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// =============================================================================
// FakeCommerce
// =============================================================================

#[derive(Default)]
struct FakeCommerceState {
    products: Vec<Product>,
    categories: Vec<Category>,
    carts: HashMap<String, Vec<CartLine>>,
    next_item_id: u64,
    /// When set, every cart read fails as if the service were down.
    fail_cart_reads: bool,
}

/// Commerce fake with the real service's line-merging behavior.
#[derive(Clone, Default)]
pub struct FakeCommerce {
    state: Arc<Mutex<FakeCommerceState>>,
}

impl FakeCommerce {
    #[must_use]
    pub fn with_products(products: Vec<Product>) -> Self {
        let fake = Self::default();
        lock(&fake.state).products = products;
        fake
    }

    /// Convenience product with the given id/name/price.
    #[must_use]
    pub fn product(id: &str, name: &str, price_minor: i64) -> Product {
        Product {
            id: id.to_owned(),
            name: name.to_owned(),
            description: format!("{name} with tomato and mozzarella"),
            price_minor,
            price_formatted: format!("{price_minor} minor"),
            image_id: Some(format!("img-{id}")),
            category_ids: vec![],
        }
    }

    pub fn set_fail_cart_reads(&self, fail: bool) {
        lock(&self.state).fail_cart_reads = fail;
    }

    /// Current lines of a cart, for assertions.
    #[must_use]
    pub fn cart_lines(&self, owner: &str) -> Vec<CartLine> {
        lock(&self.state).carts.get(owner).cloned().unwrap_or_default()
    }

    fn summary(lines: &[CartLine]) -> CartSummary {
        let total: i64 = lines
            .iter()
            .map(|line| line.unit_price_minor * i64::from(line.quantity))
            .sum();
        CartSummary {
            lines: lines.to_vec(),
            total_minor: total,
            total_formatted: format!("{total} minor"),
        }
    }
}

#[async_trait]
impl Commerce for FakeCommerce {
    async fn products(&self, category_id: Option<&str>) -> Result<Vec<Product>, CommerceError> {
        let state = lock(&self.state);
        Ok(state
            .products
            .iter()
            .filter(|product| {
                category_id.is_none_or(|id| product.category_ids.iter().any(|c| c == id))
            })
            .cloned()
            .collect())
    }

    async fn product(&self, product_id: &str) -> Result<Product, CommerceError> {
        lock(&self.state)
            .products
            .iter()
            .find(|product| product.id == product_id)
            .cloned()
            .ok_or_else(|| CommerceError::NotFound(product_id.to_owned()))
    }

    async fn categories(&self) -> Result<Vec<Category>, CommerceError> {
        Ok(lock(&self.state).categories.clone())
    }

    async fn image_url(&self, file_id: &str) -> Result<String, CommerceError> {
        Ok(format!("https://cdn.example/{file_id}.jpg"))
    }

    async fn cart(&self, cart_owner: &str) -> Result<CartSummary, CommerceError> {
        let state = lock(&self.state);
        if state.fail_cart_reads {
            return Err(CommerceError::Api {
                status: 502,
                message: "bad gateway".to_owned(),
            });
        }
        Ok(Self::summary(
            state.carts.get(cart_owner).map_or(&[][..], Vec::as_slice),
        ))
    }

    async fn add_cart_item(
        &self,
        cart_owner: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<(), CommerceError> {
        let mut state = lock(&self.state);
        let product = state
            .products
            .iter()
            .find(|product| product.id == product_id)
            .cloned()
            .ok_or_else(|| CommerceError::NotFound(product_id.to_owned()))?;

        let lines = state.carts.entry(cart_owner.to_owned()).or_default();
        // The real cart service merges repeated adds of the same product
        // into one line.
        if let Some(line) = lines
            .iter_mut()
            .find(|line| line.product_id.as_deref() == Some(product_id))
        {
            line.quantity += quantity;
            line.line_total_formatted =
                format!("{} minor", line.unit_price_minor * i64::from(line.quantity));
            return Ok(());
        }

        state.next_item_id += 1;
        let item_id = format!("item-{}", state.next_item_id);
        state
            .carts
            .entry(cart_owner.to_owned())
            .or_default()
            .push(CartLine {
                item_id,
                product_id: Some(product.id.clone()),
                sku: Some(pronto_core::cart::slugify(&product.name)),
                name: product.name.clone(),
                description: Some(product.description.clone()),
                quantity,
                unit_price_minor: product.price_minor,
                unit_price_formatted: format!("{} minor", product.price_minor),
                line_total_formatted: format!(
                    "{} minor",
                    product.price_minor * i64::from(quantity)
                ),
                image_url: None,
            });
        Ok(())
    }

    async fn add_custom_item(
        &self,
        cart_owner: &str,
        name: &str,
        sku: &str,
        price_minor: i64,
    ) -> Result<(), CommerceError> {
        let mut state = lock(&self.state);
        state.next_item_id += 1;
        let item_id = format!("item-{}", state.next_item_id);
        state
            .carts
            .entry(cart_owner.to_owned())
            .or_default()
            .push(CartLine {
                item_id,
                product_id: None,
                sku: Some(sku.to_owned()),
                name: name.to_owned(),
                description: None,
                quantity: 1,
                unit_price_minor: price_minor,
                unit_price_formatted: format!("{price_minor} minor"),
                line_total_formatted: format!("{price_minor} minor"),
                image_url: None,
            });
        Ok(())
    }

    async fn remove_cart_item(
        &self,
        cart_owner: &str,
        item_id: &str,
    ) -> Result<(), CommerceError> {
        let mut state = lock(&self.state);
        if let Some(lines) = state.carts.get_mut(cart_owner) {
            lines.retain(|line| line.item_id != item_id);
        }
        Ok(())
    }

    async fn delete_cart(&self, cart_owner: &str) -> Result<(), CommerceError> {
        lock(&self.state).carts.remove(cart_owner);
        Ok(())
    }
}

// =============================================================================
// FakeLocations
// =============================================================================

#[derive(Default)]
struct FakeLocationsState {
    geocode: HashMap<String, Coordinate>,
    sites: Vec<FulfillmentLocation>,
    records: Vec<CustomerLocation>,
}

/// Locations fake with a canned geocode table.
#[derive(Clone, Default)]
pub struct FakeLocations {
    state: Arc<Mutex<FakeLocationsState>>,
}

impl FakeLocations {
    #[must_use]
    pub fn with_sites(sites: Vec<FulfillmentLocation>) -> Self {
        let fake = Self::default();
        lock(&fake.state).sites = sites;
        fake
    }

    pub fn add_geocode(&self, address: &str, coordinate: Coordinate) {
        lock(&self.state)
            .geocode
            .insert(address.to_owned(), coordinate);
    }

    /// All recorded customer locations, for assertions.
    #[must_use]
    pub fn records(&self) -> Vec<CustomerLocation> {
        lock(&self.state).records.clone()
    }

    /// Convenience fulfillment location.
    #[must_use]
    pub fn site(id: &str, longitude: f64, latitude: f64, courier: &str) -> FulfillmentLocation {
        FulfillmentLocation {
            id: id.to_owned(),
            address: format!("{id} street 1"),
            alias: id.to_owned(),
            coordinate: Coordinate::new(longitude, latitude),
            courier_channel_id: courier.to_owned(),
        }
    }
}

#[async_trait]
impl Locations for FakeLocations {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>, GeoError> {
        Ok(lock(&self.state).geocode.get(address).copied())
    }

    async fn fulfillment_locations(&self) -> Result<Vec<FulfillmentLocation>, GeoError> {
        Ok(lock(&self.state).sites.clone())
    }

    async fn fulfillment_location(&self, id: &str) -> Result<FulfillmentLocation, GeoError> {
        lock(&self.state)
            .sites
            .iter()
            .find(|site| site.id == id)
            .cloned()
            .ok_or_else(|| GeoError::Commerce(CommerceError::NotFound(id.to_owned())))
    }

    async fn record_customer_location(
        &self,
        location: &CustomerLocation,
    ) -> Result<(), GeoError> {
        let mut state = lock(&self.state);
        let sequence = i64::try_from(state.records.len()).unwrap_or(i64::MAX);
        let mut stamped = location.clone();
        // Deterministic, strictly increasing creation times.
        stamped.created_at = Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .map(|base| base + Duration::seconds(sequence));
        state.records.push(stamped);
        Ok(())
    }

    async fn latest_customer_location(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerLocation>, GeoError> {
        Ok(lock(&self.state)
            .records
            .iter()
            .filter(|record| record.customer_id == customer_id)
            .max_by_key(|record| record.created_at)
            .cloned())
    }
}

// =============================================================================
// RecordingTransport
// =============================================================================

/// Every outbound call the engine makes, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text {
        to: String,
        text: String,
    },
    Menu {
        to: String,
        page_start: usize,
        product_ids: Vec<String>,
    },
    ProductCard {
        to: String,
        product_id: String,
    },
    Cart {
        to: String,
        text: Option<String>,
    },
    LocationRequest {
        to: String,
    },
    DeliveryOptions {
        to: String,
        nearest_id: String,
        price_minor: Option<i64>,
    },
    PaymentPrompt {
        to: String,
        text: String,
    },
    Invoice {
        to: String,
        payload: String,
        lines: Vec<(String, i64)>,
    },
    PrecheckAnswer {
        query_id: String,
        approved: bool,
    },
    MapPoint {
        to: String,
        longitude: f64,
        latitude: f64,
    },
    Toast {
        to: String,
        text: String,
    },
}

/// Transport fake that records instead of sending.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    outbound: Arc<Mutex<Vec<Outbound>>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn outbound(&self) -> Vec<Outbound> {
        lock(&self.outbound).clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Outbound> {
        lock(&self.outbound).last().cloned()
    }

    fn record(&self, outbound: Outbound) {
        lock(&self.outbound).push(outbound);
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, user_key: &str, text: &str) -> Result<(), TransportError> {
        self.record(Outbound::Text {
            to: user_key.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn send_menu(&self, user_key: &str, menu: &MenuView) -> Result<(), TransportError> {
        self.record(Outbound::Menu {
            to: user_key.to_owned(),
            page_start: menu.page.start,
            product_ids: menu
                .entries
                .iter()
                .map(|entry| entry.product.id.clone())
                .collect(),
        });
        Ok(())
    }

    async fn send_product_card(
        &self,
        user_key: &str,
        card: &ProductCard,
    ) -> Result<(), TransportError> {
        self.record(Outbound::ProductCard {
            to: user_key.to_owned(),
            product_id: card.product.id.clone(),
        });
        Ok(())
    }

    async fn send_cart(&self, user_key: &str, view: &CartView) -> Result<(), TransportError> {
        self.record(Outbound::Cart {
            to: user_key.to_owned(),
            text: view.text.clone(),
        });
        Ok(())
    }

    async fn request_location(&self, user_key: &str) -> Result<(), TransportError> {
        self.record(Outbound::LocationRequest {
            to: user_key.to_owned(),
        });
        Ok(())
    }

    async fn send_delivery_options(
        &self,
        user_key: &str,
        view: &DeliveryOptionsView,
    ) -> Result<(), TransportError> {
        self.record(Outbound::DeliveryOptions {
            to: user_key.to_owned(),
            nearest_id: view.quote.nearest.id.clone(),
            price_minor: view.quote.price_minor,
        });
        Ok(())
    }

    async fn send_payment_prompt(
        &self,
        user_key: &str,
        text: &str,
    ) -> Result<(), TransportError> {
        self.record(Outbound::PaymentPrompt {
            to: user_key.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn send_invoice(
        &self,
        user_key: &str,
        invoice: &Invoice,
    ) -> Result<(), TransportError> {
        self.record(Outbound::Invoice {
            to: user_key.to_owned(),
            payload: invoice.payload.clone(),
            lines: invoice
                .lines
                .iter()
                .map(|line| (line.label.clone(), line.amount_minor))
                .collect(),
        });
        Ok(())
    }

    async fn answer_precheck(
        &self,
        query_id: &str,
        outcome: PrecheckOutcome,
    ) -> Result<(), TransportError> {
        self.record(Outbound::PrecheckAnswer {
            query_id: query_id.to_owned(),
            approved: matches!(outcome, PrecheckOutcome::Approve),
        });
        Ok(())
    }

    async fn send_location(
        &self,
        channel_id: &str,
        coordinate: Coordinate,
    ) -> Result<(), TransportError> {
        self.record(Outbound::MapPoint {
            to: channel_id.to_owned(),
            longitude: coordinate.longitude,
            latitude: coordinate.latitude,
        });
        Ok(())
    }

    async fn toast(&self, user_key: &str, text: &str) -> Result<(), TransportError> {
        self.record(Outbound::Toast {
            to: user_key.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }
}
