//! Wire types for the commerce service's JSON API.
//!
//! The service wraps everything in a `data` envelope and reports prices
//! twice: raw minor-unit amounts and preformatted display strings under
//! `meta.display_price.with_tax`. Conversions into the crate-level display
//! types live here so the client code stays free of envelope noise.

use serde::Deserialize;

use pronto_core::cart::{CartLine, CartSummary};
use pronto_core::catalog::{Category, Product};

/// Generic `data` envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Envelope that also carries cart-level pricing metadata.
#[derive(Debug, Deserialize)]
pub struct CartEnvelope {
    pub data: Vec<CartItemData>,
    pub meta: CartMeta,
}

#[derive(Debug, Deserialize)]
pub struct ProductData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: Vec<PriceEntry>,
    pub meta: ProductMeta,
    #[serde(default)]
    pub relationships: Relationships,
}

#[derive(Debug, Deserialize)]
pub struct PriceEntry {
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct ProductMeta {
    pub display_price: DisplayPrice,
}

#[derive(Debug, Deserialize)]
pub struct DisplayPrice {
    pub with_tax: FormattedAmount,
}

#[derive(Debug, Deserialize)]
pub struct FormattedAmount {
    pub amount: i64,
    pub formatted: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Relationships {
    #[serde(default)]
    pub main_image: Option<Relationship>,
    #[serde(default)]
    pub categories: Option<RelationshipList>,
}

#[derive(Debug, Deserialize)]
pub struct Relationship {
    pub data: RelatedRef,
}

#[derive(Debug, Deserialize)]
pub struct RelationshipList {
    #[serde(default)]
    pub data: Vec<RelatedRef>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedRef {
    pub id: String,
}

impl From<ProductData> for Product {
    fn from(data: ProductData) -> Self {
        Self {
            price_minor: data.meta.display_price.with_tax.amount,
            price_formatted: data.meta.display_price.with_tax.formatted,
            image_id: data.relationships.main_image.map(|rel| rel.data.id),
            category_ids: data
                .relationships
                .categories
                .map(|list| list.data.into_iter().map(|r| r.id).collect())
                .unwrap_or_default(),
            id: data.id,
            name: data.name,
            description: data.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryData {
    pub id: String,
    pub name: String,
}

impl From<CategoryData> for Category {
    fn from(data: CategoryData) -> Self {
        Self {
            id: data.id,
            name: data.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CartItemData {
    pub id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: u32,
    pub unit_price: UnitPrice,
    pub meta: CartItemMeta,
    #[serde(default)]
    pub image: Option<ImageLink>,
}

#[derive(Debug, Deserialize)]
pub struct UnitPrice {
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CartItemMeta {
    pub display_price: CartItemDisplayPrice,
}

#[derive(Debug, Deserialize)]
pub struct CartItemDisplayPrice {
    pub with_tax: CartItemPrices,
}

#[derive(Debug, Deserialize)]
pub struct CartItemPrices {
    pub unit: FormattedAmount,
    pub value: FormattedAmount,
}

#[derive(Debug, Deserialize)]
pub struct ImageLink {
    pub href: String,
}

#[derive(Debug, Deserialize)]
pub struct CartMeta {
    pub display_price: DisplayPrice,
}

impl From<CartItemData> for CartLine {
    fn from(item: CartItemData) -> Self {
        Self {
            unit_price_minor: item.meta.display_price.with_tax.unit.amount,
            unit_price_formatted: item.meta.display_price.with_tax.unit.formatted,
            line_total_formatted: item.meta.display_price.with_tax.value.formatted,
            item_id: item.id,
            product_id: item.product_id,
            sku: item.sku,
            name: item.name,
            description: item.description,
            quantity: item.quantity,
            image_url: item.image.map(|img| img.href),
        }
    }
}

impl From<CartEnvelope> for CartSummary {
    fn from(envelope: CartEnvelope) -> Self {
        Self {
            lines: envelope.data.into_iter().map(CartLine::from).collect(),
            total_minor: envelope.meta.display_price.with_tax.amount,
            total_formatted: envelope.meta.display_price.with_tax.formatted,
        }
    }
}

/// File record; only the public link matters.
#[derive(Debug, Deserialize)]
pub struct FileData {
    pub link: ImageLink,
}

/// A fulfillment-location flow entry.
///
/// Flow fields are flat on the entry; the courier channel field uses the
/// service's hyphenated slug.
#[derive(Debug, Deserialize)]
pub struct PizzeriaEntry {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub alias: String,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(rename = "courier-id")]
    pub courier_id: String,
}

/// A customer-location flow entry.
#[derive(Debug, Deserialize)]
pub struct CustomerLocationEntry {
    pub id: String,
    pub customer_id: String,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(rename = "delivery-price", default)]
    pub delivery_price: i64,
    #[serde(default)]
    pub meta: Option<EntryMeta>,
}

#[derive(Debug, Deserialize)]
pub struct EntryMeta {
    pub timestamps: EntryTimestamps,
}

#[derive(Debug, Deserialize)]
pub struct EntryTimestamps {
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_envelope_converts_to_summary() {
        let raw = serde_json::json!({
            "data": [
                {
                    "id": "line-1",
                    "product_id": "prod-1",
                    "sku": "margherita",
                    "name": "Margherita",
                    "description": "Tomato, mozzarella",
                    "quantity": 2,
                    "unit_price": { "amount": 40_000 },
                    "image": { "href": "https://cdn.example/margherita.jpg" },
                    "meta": { "display_price": { "with_tax": {
                        "unit": { "amount": 40_000, "formatted": "400 ₽" },
                        "value": { "amount": 80_000, "formatted": "800 ₽" }
                    }}}
                },
                {
                    "id": "line-2",
                    "sku": "delivery",
                    "name": "Delivery",
                    "quantity": 1,
                    "unit_price": { "amount": 10_000 },
                    "meta": { "display_price": { "with_tax": {
                        "unit": { "amount": 10_000, "formatted": "100 ₽" },
                        "value": { "amount": 10_000, "formatted": "100 ₽" }
                    }}}
                }
            ],
            "meta": { "display_price": { "with_tax": {
                "amount": 90_000, "formatted": "900 ₽"
            }}}
        });

        let envelope: CartEnvelope = serde_json::from_value(raw).expect("fixture parses");
        let cart = CartSummary::from(envelope);

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.total_minor, 90_000);
        assert_eq!(cart.total_formatted, "900 ₽");
        assert!(cart.has_delivery_line());
        assert_eq!(cart.product_lines().count(), 1);
        let line = cart.lines.first().expect("two lines");
        assert_eq!(line.unit_price_formatted, "400 ₽");
        assert_eq!(line.line_total_formatted, "800 ₽");
        assert_eq!(line.image_url.as_deref(), Some("https://cdn.example/margherita.jpg"));
    }

    #[test]
    fn test_product_conversion_pulls_display_price_and_image() {
        let raw = serde_json::json!({
            "id": "prod-1",
            "name": "Pepperoni Fresh",
            "description": "Spicy",
            "price": [{ "amount": 45_000, "currency": "RUB" }],
            "meta": { "display_price": { "with_tax": {
                "amount": 45_000, "formatted": "450 ₽"
            }}},
            "relationships": {
                "main_image": { "data": { "id": "file-9" } },
                "categories": { "data": [{ "id": "cat-1" }, { "id": "cat-2" }] }
            }
        });

        let product = Product::from(serde_json::from_value::<ProductData>(raw).expect("parses"));
        assert_eq!(product.price_minor, 45_000);
        assert_eq!(product.price_formatted, "450 ₽");
        assert_eq!(product.image_id.as_deref(), Some("file-9"));
        assert_eq!(product.category_ids, vec!["cat-1", "cat-2"]);
    }

    #[test]
    fn test_pizzeria_entry_uses_hyphenated_courier_field() {
        let raw = serde_json::json!({
            "id": "pz-1",
            "address": "1 Example Street",
            "alias": "center",
            "longitude": 37.62,
            "latitude": 55.75,
            "courier-id": "98765"
        });
        let entry: PizzeriaEntry = serde_json::from_value(raw).expect("parses");
        assert_eq!(entry.courier_id, "98765");
    }
}
