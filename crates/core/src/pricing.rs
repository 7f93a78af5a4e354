//! Distance-tier delivery pricing.
//!
//! Pure policy: a [`TierTable`] quotes a delivery price for a distance, and
//! [`nearest_location`] picks the fulfillment location to quote against.
//! Nothing here touches the network or any state.

use crate::location::{Coordinate, FulfillmentLocation};

/// Mean Earth radius in kilometres (IUGG).
const EARTH_RADIUS_KM: f64 = 6_371.008_8;

/// Ascending `(max distance km, price minor)` tiers.
///
/// A distance selects the first tier whose bound is **greater than or
/// equal** to it (closed upper bound: exactly 0.5 km rides the free tier,
/// not the next one). Distances beyond the last bound are undeliverable.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    tiers: Vec<(f64, i64)>,
}

impl Default for TierTable {
    /// The stock table: free within 500 m, 100 within 5 km, 300 within
    /// 20 km, pickup only beyond that.
    fn default() -> Self {
        Self::new(vec![(0.5, 0), (5.0, 100), (20.0, 300)])
    }
}

impl TierTable {
    /// Build a table from `(max distance km, price minor)` pairs. The pairs
    /// are sorted ascending by distance bound, whatever order they arrive
    /// in.
    #[must_use]
    pub fn new(mut tiers: Vec<(f64, i64)>) -> Self {
        tiers.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { tiers }
    }

    /// Quote a delivery price for a non-negative distance.
    ///
    /// `None` means the distance is beyond the last tier and the location
    /// is pickup only.
    #[must_use]
    pub fn price_for_distance(&self, distance_km: f64) -> Option<i64> {
        self.tiers
            .iter()
            .find(|(bound, _)| *bound >= distance_km)
            .map(|(_, price)| *price)
    }
}

/// Great-circle distance between two points, in kilometres (haversine).
#[must_use]
pub fn great_circle_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// The fulfillment location nearest to `point`, with its distance.
///
/// Ties are broken by first-seen order; `None` only when no locations are
/// known.
#[must_use]
pub fn nearest_location(
    locations: &[FulfillmentLocation],
    point: Coordinate,
) -> Option<(&FulfillmentLocation, f64)> {
    let mut best: Option<(&FulfillmentLocation, f64)> = None;
    for location in locations {
        let distance = great_circle_km(location.coordinate, point);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((location, distance)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock() -> TierTable {
        TierTable::default()
    }

    fn site(id: &str, longitude: f64, latitude: f64) -> FulfillmentLocation {
        FulfillmentLocation {
            id: id.to_owned(),
            address: format!("{id} street 1"),
            alias: id.to_owned(),
            coordinate: Coordinate::new(longitude, latitude),
            courier_channel_id: format!("courier-{id}"),
        }
    }

    #[test]
    fn test_tier_bounds_are_closed() {
        let table = stock();
        assert_eq!(table.price_for_distance(0.5), Some(0));
        assert_eq!(table.price_for_distance(0.500_001), Some(100));
        assert_eq!(table.price_for_distance(5.0), Some(100));
        assert_eq!(table.price_for_distance(5.000_001), Some(300));
        assert_eq!(table.price_for_distance(20.0), Some(300));
    }

    #[test]
    fn test_beyond_last_tier_is_undeliverable() {
        assert_eq!(stock().price_for_distance(20.000_001), None);
        assert_eq!(stock().price_for_distance(500.0), None);
    }

    #[test]
    fn test_zero_distance_rides_the_first_tier() {
        assert_eq!(stock().price_for_distance(0.0), Some(0));
    }

    #[test]
    fn test_prices_are_monotonic_in_distance() {
        let table = stock();
        let mut last = i64::MIN;
        for step in 0..=2_000 {
            let d = f64::from(step) * 0.01;
            match table.price_for_distance(d) {
                Some(price) => {
                    assert!(price >= last, "price dropped at {d} km");
                    last = price;
                }
                None => break,
            }
        }
    }

    #[test]
    fn test_unsorted_input_is_normalized() {
        let table = TierTable::new(vec![(20.0, 300), (0.5, 0), (5.0, 100)]);
        assert_eq!(table.price_for_distance(0.2), Some(0));
        assert_eq!(table.price_for_distance(7.0), Some(300));
    }

    #[test]
    fn test_great_circle_zero_for_same_point() {
        let p = Coordinate::new(37.618_423, 55.751_244);
        assert!(great_circle_km(p, p) < 1e-9);
    }

    #[test]
    fn test_great_circle_known_pair() {
        // Moscow Kremlin to Saint Basil's Cathedral, roughly half a km.
        let kremlin = Coordinate::new(37.617_664, 55.752_121);
        let cathedral = Coordinate::new(37.623_082, 55.752_523);
        let km = great_circle_km(kremlin, cathedral);
        assert!((0.2..0.6).contains(&km), "got {km}");
    }

    #[test]
    fn test_nearest_picks_minimum_distance() {
        let sites = vec![
            site("far", 37.7, 55.9),
            site("near", 37.62, 55.76),
            site("mid", 37.5, 55.8),
        ];
        let (found, distance) = nearest_location(&sites, Coordinate::new(37.618, 55.751))
            .expect("sites are not empty");
        assert_eq!(found.id, "near");
        assert!(distance < 2.0);
    }

    #[test]
    fn test_nearest_tie_breaks_first_seen() {
        // Two sites symmetric about the query point on the same parallel.
        let sites = vec![site("west", 37.60, 55.75), site("east", 37.64, 55.75)];
        let (found, _) = nearest_location(&sites, Coordinate::new(37.62, 55.75))
            .expect("sites are not empty");
        assert_eq!(found.id, "west");
    }

    #[test]
    fn test_nearest_of_empty_is_none() {
        assert!(nearest_location(&[], Coordinate::new(0.0, 0.0)).is_none());
    }
}
