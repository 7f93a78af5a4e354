//! Cart snapshot types and cart text composition.
//!
//! The cart is owned by the remote commerce service; these types are a
//! read-mostly snapshot fetched fresh on every cart-affecting step. Nothing
//! here is cached locally - staleness would mean double charges or stale
//! totals.

use serde::{Deserialize, Serialize};

/// Display name of the synthetic delivery line item.
pub const DELIVERY_ITEM_NAME: &str = "Delivery";

/// The fixed identifier the commerce service derives for a custom item from
/// its display name. The delivery line is recognized by this SKU; if the
/// service ever changes its derivation, the at-most-one-delivery-line
/// guarantee breaks with it (see the identity test below).
#[must_use]
pub fn delivery_sku() -> String {
    slugify(DELIVERY_ITEM_NAME)
}

/// Lowercase, hyphen-separated identifier derivation, matching how the
/// commerce service slugs custom item names.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = true;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    slug.trim_end_matches('-').to_owned()
}

/// One priced line of a cart snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Cart line id (used to remove the line).
    pub item_id: String,
    /// Backing catalog product id; `None` for custom items.
    pub product_id: Option<String>,
    /// Service-derived item identifier.
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub quantity: u32,
    /// Unit price in the currency's smallest unit.
    pub unit_price_minor: i64,
    /// Unit price as formatted by the catalog service.
    pub unit_price_formatted: String,
    /// Line total as formatted by the catalog service.
    pub line_total_formatted: String,
    pub image_url: Option<String>,
}

impl CartLine {
    /// Whether this is the synthetic delivery line.
    #[must_use]
    pub fn is_delivery(&self) -> bool {
        self.sku.as_deref() == Some(delivery_sku().as_str())
    }
}

/// A priced cart snapshot as returned by the commerce service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    /// Grand total in the currency's smallest unit.
    pub total_minor: i64,
    /// Grand total as formatted by the catalog service.
    pub total_formatted: String,
}

impl CartSummary {
    /// Lines backed by catalog products, in service order.
    pub fn product_lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter().filter(|line| !line.is_delivery())
    }

    /// The delivery line, if one has been added.
    #[must_use]
    pub fn delivery_line(&self) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.is_delivery())
    }

    #[must_use]
    pub fn has_delivery_line(&self) -> bool {
        self.delivery_line().is_some()
    }
}

/// Render a cart as chat text: one block per product line, a delivery row
/// if the delivery line is present, then the grand total.
///
/// Returns `None` when the cart has no product lines. A delivery charge
/// with no products still counts as empty - that is a policy choice, not an
/// oversight: a cart that only ever held a delivery fee has nothing to
/// check out.
#[must_use]
pub fn compose_cart_text(cart: &CartSummary) -> Option<String> {
    if cart.product_lines().next().is_none() {
        return None;
    }

    let mut rows: Vec<String> = cart
        .product_lines()
        .map(|line| {
            format!(
                "{}\n{}\n{} pcs at {} each\nSubtotal {}",
                line.name,
                line.description.as_deref().unwrap_or_default(),
                line.quantity,
                line.unit_price_formatted,
                line.line_total_formatted,
            )
        })
        .collect();

    if let Some(delivery) = cart.delivery_line() {
        rows.push(format!(
            "{DELIVERY_ITEM_NAME} {}",
            delivery.line_total_formatted
        ));
    }

    rows.push(format!("Total due: {}", cart.total_formatted));

    Some(rows.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_line(name: &str) -> CartLine {
        CartLine {
            item_id: format!("item-{name}"),
            product_id: Some(format!("prod-{name}")),
            sku: Some(slugify(name)),
            name: name.to_owned(),
            description: Some("Tomato, mozzarella".to_owned()),
            quantity: 2,
            unit_price_minor: 40_000,
            unit_price_formatted: "400 ₽".to_owned(),
            line_total_formatted: "800 ₽".to_owned(),
            image_url: None,
        }
    }

    fn delivery_line(price_formatted: &str) -> CartLine {
        CartLine {
            item_id: "item-delivery".to_owned(),
            product_id: None,
            sku: Some(delivery_sku()),
            name: DELIVERY_ITEM_NAME.to_owned(),
            description: None,
            quantity: 1,
            unit_price_minor: 10_000,
            unit_price_formatted: price_formatted.to_owned(),
            line_total_formatted: price_formatted.to_owned(),
            image_url: None,
        }
    }

    #[test]
    fn test_slugify_matches_service_derivation() {
        assert_eq!(slugify("Delivery"), "delivery");
        assert_eq!(slugify("Pepperoni Fresh"), "pepperoni-fresh");
        assert_eq!(slugify("  Double--Cheese  "), "double-cheese");
    }

    #[test]
    fn test_delivery_line_identity_is_the_slugged_display_name() {
        // The coupling under test: the commerce service derives the custom
        // item SKU from its display name. If this assertion ever fails the
        // idempotency of ensure_delivery_line silently breaks.
        assert_eq!(delivery_sku(), "delivery");
        assert!(delivery_line("100 ₽").is_delivery());
        assert!(!product_line("Margherita").is_delivery());
    }

    #[test]
    fn test_empty_cart_renders_as_none() {
        assert_eq!(compose_cart_text(&CartSummary::default()), None);
    }

    #[test]
    fn test_delivery_only_cart_still_renders_as_none() {
        let cart = CartSummary {
            lines: vec![delivery_line("100 ₽")],
            total_minor: 10_000,
            total_formatted: "100 ₽".to_owned(),
        };
        assert_eq!(compose_cart_text(&cart), None);
    }

    #[test]
    fn test_single_product_without_delivery_is_item_plus_total() {
        let cart = CartSummary {
            lines: vec![product_line("Margherita")],
            total_minor: 80_000,
            total_formatted: "800 ₽".to_owned(),
        };
        let text = compose_cart_text(&cart).expect("cart has a product line");
        let rows: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("Margherita\n"));
        assert_eq!(rows[1], "Total due: 800 ₽");
        assert!(!text.contains(DELIVERY_ITEM_NAME));
    }

    #[test]
    fn test_delivery_row_sits_between_items_and_total() {
        let cart = CartSummary {
            lines: vec![product_line("Margherita"), delivery_line("100 ₽")],
            total_minor: 90_000,
            total_formatted: "900 ₽".to_owned(),
        };
        let text = compose_cart_text(&cart).expect("cart has a product line");
        let rows: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], "Delivery 100 ₽");
        assert_eq!(rows[2], "Total due: 900 ₽");
    }
}
