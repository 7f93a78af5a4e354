//! External geocoder client.
//!
//! Resolves a free-text address to WGS84 coordinates. The provider answers
//! with a feature collection; the first member's `Point.pos` field carries
//! `"<longitude> <latitude>"`. An empty collection means the address was
//! not recognized.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use pronto_core::location::Coordinate;

use super::GeoError;

/// Geocoder connection settings.
#[derive(Clone)]
pub struct GeocoderConfig {
    /// API origin, e.g. `https://geocode-maps.yandex.ru`.
    pub base_url: String,
    pub api_key: SecretString,
}

impl std::fmt::Debug for GeocoderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocoderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct GeocoderResponse {
    response: GeoObjectCollectionWrapper,
}

#[derive(Deserialize)]
struct GeoObjectCollectionWrapper {
    #[serde(rename = "GeoObjectCollection")]
    collection: GeoObjectCollection,
}

#[derive(Deserialize)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember", default)]
    members: Vec<FeatureMember>,
}

#[derive(Deserialize)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: GeoObject,
}

#[derive(Deserialize)]
struct GeoObject {
    #[serde(rename = "Point")]
    point: Point,
}

#[derive(Deserialize)]
struct Point {
    /// `"<longitude> <latitude>"`.
    pos: String,
}

/// Client for the geocoding provider.
#[derive(Debug, Clone)]
pub struct GeocoderClient {
    client: reqwest::Client,
    config: GeocoderConfig,
}

impl GeocoderClient {
    #[must_use]
    pub fn new(config: GeocoderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Resolve an address to a coordinate; `Ok(None)` when unrecognized.
    ///
    /// # Errors
    ///
    /// Returns `GeoError::Http` on transport failure and `GeoError::Parse`
    /// when the provider's response does not carry a readable point.
    #[instrument(skip(self))]
    pub async fn coordinates(&self, address: &str) -> Result<Option<Coordinate>, GeoError> {
        let response = self
            .client
            .get(format!("{}/1.x/", self.config.base_url))
            .query(&[
                ("apikey", self.config.api_key.expose_secret()),
                ("geocode", address),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let parsed: GeocoderResponse = response
            .json()
            .await
            .map_err(|err| GeoError::Parse(err.to_string()))?;

        let Some(member) = parsed.response.collection.members.into_iter().next() else {
            return Ok(None);
        };

        parse_pos(&member.geo_object.point.pos)
            .ok_or_else(|| GeoError::Parse(format!("bad point: {}", member.geo_object.point.pos)))
            .map(Some)
    }
}

fn parse_pos(pos: &str) -> Option<Coordinate> {
    let mut parts = pos.split_whitespace();
    let longitude = parts.next()?.parse().ok()?;
    let latitude = parts.next()?.parse().ok()?;
    Some(Coordinate::new(longitude, latitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_parses_longitude_first() {
        let coordinate = parse_pos("37.618423 55.751244").expect("valid pos");
        assert!((coordinate.longitude - 37.618_423).abs() < 1e-9);
        assert!((coordinate.latitude - 55.751_244).abs() < 1e-9);
    }

    #[test]
    fn test_bad_pos_is_rejected() {
        assert!(parse_pos("").is_none());
        assert!(parse_pos("37.6").is_none());
        assert!(parse_pos("north south").is_none());
    }

    #[test]
    fn test_empty_feature_collection_deserializes() {
        let raw = serde_json::json!({
            "response": { "GeoObjectCollection": { "featureMember": [] } }
        });
        let parsed: GeocoderResponse = serde_json::from_value(raw).expect("parses");
        assert!(parsed.response.collection.members.is_empty());
    }
}
