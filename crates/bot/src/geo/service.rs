//! Location service backed by the geocoder and the commerce flows.

use async_trait::async_trait;
use tracing::instrument;

use pronto_core::location::{Coordinate, CustomerLocation, FulfillmentLocation};

use crate::commerce::CommerceClient;
use crate::commerce::types::{CustomerLocationEntry, PizzeriaEntry};

use super::{GeoError, GeocoderClient, Locations};

/// Resolves addresses and reads/appends location records.
///
/// Cheaply cloneable; both underlying clients share their connection pools
/// across clones.
#[derive(Clone)]
pub struct LocationService {
    geocoder: GeocoderClient,
    commerce: CommerceClient,
}

impl LocationService {
    #[must_use]
    pub const fn new(geocoder: GeocoderClient, commerce: CommerceClient) -> Self {
        Self { geocoder, commerce }
    }
}

impl From<PizzeriaEntry> for FulfillmentLocation {
    fn from(entry: PizzeriaEntry) -> Self {
        Self {
            coordinate: Coordinate::new(entry.longitude, entry.latitude),
            id: entry.id,
            address: entry.address,
            alias: entry.alias,
            courier_channel_id: entry.courier_id,
        }
    }
}

impl From<CustomerLocationEntry> for CustomerLocation {
    fn from(entry: CustomerLocationEntry) -> Self {
        Self {
            coordinate: Coordinate::new(entry.longitude, entry.latitude),
            customer_id: entry.customer_id,
            delivery_price_minor: entry.delivery_price,
            created_at: entry.meta.map(|meta| meta.timestamps.created_at),
        }
    }
}

#[async_trait]
impl Locations for LocationService {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>, GeoError> {
        self.geocoder.coordinates(address).await
    }

    #[instrument(skip(self))]
    async fn fulfillment_locations(&self) -> Result<Vec<FulfillmentLocation>, GeoError> {
        let entries: Vec<PizzeriaEntry> = self
            .commerce
            .flow_entries(self.commerce.pizzeria_flow_slug())
            .await?;
        Ok(entries.into_iter().map(FulfillmentLocation::from).collect())
    }

    async fn fulfillment_location(&self, id: &str) -> Result<FulfillmentLocation, GeoError> {
        let entry: PizzeriaEntry = self
            .commerce
            .flow_entry(self.commerce.pizzeria_flow_slug(), id)
            .await?;
        Ok(FulfillmentLocation::from(entry))
    }

    #[instrument(skip(self, location), fields(customer_id = %location.customer_id))]
    async fn record_customer_location(
        &self,
        location: &CustomerLocation,
    ) -> Result<(), GeoError> {
        let fields = serde_json::json!({
            "customer_id": location.customer_id,
            "longitude": location.coordinate.longitude,
            "latitude": location.coordinate.latitude,
            "delivery-price": location.delivery_price_minor,
        });
        self.commerce
            .create_flow_entry(self.commerce.customer_location_flow_slug(), &fields)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn latest_customer_location(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerLocation>, GeoError> {
        let entries: Vec<CustomerLocationEntry> = self
            .commerce
            .flow_entries(self.commerce.customer_location_flow_slug())
            .await?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.customer_id == customer_id)
            .max_by_key(|entry| entry.meta.as_ref().map(|meta| meta.timestamps.created_at))
            .map(CustomerLocation::from))
    }
}
