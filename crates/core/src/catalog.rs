//! Catalog display types.
//!
//! Read-only views of what the commerce service sells. Prices arrive both
//! as minor units (for invoicing) and as the service's preformatted display
//! string; nothing here does currency arithmetic beyond that.

use serde::{Deserialize, Serialize};

/// A product's display fields, as resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Unit price in the currency's smallest unit.
    pub price_minor: i64,
    /// Unit price as formatted by the catalog service.
    pub price_formatted: String,
    /// File id of the main image, if one is linked.
    pub image_id: Option<String>,
    /// Categories the product belongs to.
    pub category_ids: Vec<String>,
}

/// A catalog category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}
