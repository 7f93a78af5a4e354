//! Outbound view models.
//!
//! Handlers describe *what* to show; each transport decides how to render
//! it (inline keyboards on Telegram, generic-template galleries on
//! Facebook). Keeping the views platform-neutral is what lets one engine
//! serve both platforms.

use pronto_core::cart::CartSummary;
use pronto_core::catalog::{Category, Product};
use pronto_core::location::{Coordinate, DeliveryQuote};

/// A window into the product list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub start: usize,
    pub end: usize,
    pub total: usize,
    pub page_size: usize,
}

impl PageInfo {
    /// Clamp a requested window to the list bounds.
    #[must_use]
    pub fn window(start: usize, page_size: usize, total: usize) -> Self {
        let start = start.min(total.saturating_sub(1));
        Self {
            start,
            end: (start + page_size).min(total),
            total,
            page_size,
        }
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.start > 0
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.end < self.total
    }

    #[must_use]
    pub const fn previous_start(&self) -> usize {
        self.start.saturating_sub(self.page_size)
    }

    #[must_use]
    pub const fn next_start(&self) -> usize {
        self.end
    }
}

/// One product on a menu page.
#[derive(Debug, Clone)]
pub struct MenuEntry {
    pub product: Product,
    /// Resolved main image, for gallery-style transports.
    pub image_url: Option<String>,
}

/// One page of the menu.
#[derive(Debug, Clone)]
pub struct MenuView {
    /// Products on this page, in catalog order.
    pub entries: Vec<MenuEntry>,
    pub page: PageInfo,
    /// Categories other than the active one, for category switching.
    pub categories: Vec<Category>,
    pub active_category: Option<String>,
}

/// A product detail card.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub product: Product,
    pub image_url: Option<String>,
}

/// The cart screen.
#[derive(Debug, Clone)]
pub struct CartView {
    /// Composed cart text; `None` means the cart is empty.
    pub text: Option<String>,
    pub cart: CartSummary,
}

/// The delivery-or-pickup decision screen.
#[derive(Debug, Clone)]
pub struct DeliveryOptionsView {
    pub quote: DeliveryQuote,
    /// The customer's resolved coordinate, echoed back on the delivery
    /// button so the choice carries its own context.
    pub customer: Coordinate,
    /// Preformatted quote price; `None` when undeliverable.
    pub price_label: Option<String>,
}

/// An itemized invoice.
#[derive(Debug, Clone)]
pub struct Invoice {
    pub title: String,
    pub description: String,
    /// Must match the fixed order payload for the precheck to pass.
    pub payload: String,
    /// ISO 4217 code.
    pub currency: String,
    pub lines: Vec<PricedLine>,
}

/// One priced invoice line, minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub label: String,
    pub amount_minor: i64,
}

/// The answer to a payment precheck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrecheckOutcome {
    Approve,
    Decline { message: String },
}

/// Render a minor-unit amount for chat text, e.g. `300 -> "3.00 RUB"`.
#[must_use]
pub fn format_minor(amount_minor: i64, currency: &str) -> String {
    format!(
        "{}.{:02} {currency}",
        amount_minor / 100,
        (amount_minor % 100).abs()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_clamps_to_list_bounds() {
        let page = PageInfo::window(8, 8, 10);
        assert_eq!((page.start, page.end), (8, 10));
        assert!(page.has_previous());
        assert!(!page.has_next());
    }

    #[test]
    fn test_first_window_of_long_list() {
        let page = PageInfo::window(0, 8, 20);
        assert_eq!((page.start, page.end), (0, 8));
        assert!(!page.has_previous());
        assert!(page.has_next());
        assert_eq!(page.next_start(), 8);
    }

    #[test]
    fn test_previous_start_saturates_at_zero() {
        let page = PageInfo::window(4, 8, 20);
        assert_eq!(page.previous_start(), 0);
    }

    #[test]
    fn test_window_of_empty_list() {
        let page = PageInfo::window(0, 8, 0);
        assert_eq!((page.start, page.end), (0, 0));
        assert!(!page.has_next());
    }

    #[test]
    fn test_format_minor() {
        assert_eq!(format_minor(0, "RUB"), "0.00 RUB");
        assert_eq!(format_minor(100, "RUB"), "1.00 RUB");
        assert_eq!(format_minor(30_050, "RUB"), "300.50 RUB");
    }
}
