//! Coordinates, fulfillment locations, and delivery quotes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS84 point, longitude first (the order the geocoder and both chat
/// platforms use on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// A physical pickup/preparation site with a courier contact channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentLocation {
    /// Commerce-service entry id.
    pub id: String,
    /// Human-readable street address.
    pub address: String,
    /// Short internal name.
    pub alias: String,
    pub coordinate: Coordinate,
    /// Chat channel id of the courier on duty at this location.
    pub courier_channel_id: String,
}

/// One appended record of where a customer asked for delivery.
///
/// Records are never updated; the customer's current location is the most
/// recent by `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerLocation {
    /// Transport-prefixed user key.
    pub customer_id: String,
    pub coordinate: Coordinate,
    /// Quoted delivery price at the time of the order, minor units.
    pub delivery_price_minor: i64,
    /// Set by the commerce service when the record is created.
    pub created_at: Option<DateTime<Utc>>,
}

/// The outcome of pricing a delivery to a resolved coordinate.
///
/// Never persisted; derived per request from the tier table.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryQuote {
    pub nearest: FulfillmentLocation,
    pub distance_km: f64,
    /// `None` means the location is undeliverable and only pickup is
    /// offered.
    pub price_minor: Option<i64>,
}
