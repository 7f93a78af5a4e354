//! Geocoding and fulfillment-location lookups.
//!
//! Two collaborators hide behind one seam: the external geocoder resolves
//! free-text addresses to coordinates, and the commerce service's flows
//! hold the fulfillment locations and the append-only customer-location
//! history.

mod geocoder;
mod service;

pub use geocoder::{GeocoderClient, GeocoderConfig};
pub use service::LocationService;

use async_trait::async_trait;
use thiserror::Error;

use pronto_core::location::{Coordinate, CustomerLocation, FulfillmentLocation};

use crate::commerce::CommerceError;

/// Errors from geocoding or location lookups.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Geocoder HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Location records live in the commerce service.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    /// The geocoder answered with a shape we do not understand.
    #[error("failed to parse geocoder response: {0}")]
    Parse(String),

    /// No fulfillment locations are configured at all.
    #[error("no fulfillment locations known")]
    NoFulfillmentLocations,
}

impl GeoError {
    /// Whether a retry of the same call can be expected to succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Commerce(err) => err.is_transient(),
            Self::Parse(_) | Self::NoFulfillmentLocations => false,
        }
    }
}

/// Location operations the conversation engine depends on.
#[async_trait]
pub trait Locations: Send + Sync {
    /// Resolve a free-text address. `Ok(None)` means the geocoder does not
    /// recognize it - user input, not a failure.
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>, GeoError>;

    /// All known fulfillment locations, in the service's order.
    async fn fulfillment_locations(&self) -> Result<Vec<FulfillmentLocation>, GeoError>;

    /// One fulfillment location by id.
    async fn fulfillment_location(&self, id: &str) -> Result<FulfillmentLocation, GeoError>;

    /// Append a customer-location record. Records are never updated.
    async fn record_customer_location(&self, location: &CustomerLocation)
    -> Result<(), GeoError>;

    /// The customer's most recent location record, by creation time.
    async fn latest_customer_location(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerLocation>, GeoError>;
}
