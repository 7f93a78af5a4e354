//! Catalog seeding: menu products and fulfillment locations.

use serde::Deserialize;
use tracing::info;

use pronto_bot::commerce::NewProduct;
use pronto_core::cart::slugify;

/// One product in a menu file.
#[derive(Debug, Deserialize)]
struct MenuFileEntry {
    id: serde_json::Value,
    name: String,
    #[serde(default)]
    description: String,
    /// Price in the currency's smallest unit.
    price: i64,
    #[serde(default)]
    product_image: Option<ImageRef>,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    url: String,
}

/// One fulfillment location in an addresses file.
#[derive(Debug, Deserialize)]
struct AddressFileEntry {
    address: AddressField,
    alias: String,
    coordinates: CoordinatesField,
    #[serde(default)]
    courier_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddressField {
    full: String,
}

#[derive(Debug, Deserialize)]
struct CoordinatesField {
    lon: serde_json::Value,
    lat: serde_json::Value,
}

/// Import a menu file: one product per entry, image downloaded from its
/// URL, uploaded, and linked as the main image.
///
/// # Errors
///
/// Returns an error on the first entry that fails; entries already
/// imported stay imported.
pub async fn menu(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let commerce = super::commerce_client_from_env()?;
    let http = reqwest::Client::new();

    let raw = tokio::fs::read_to_string(file).await?;
    let entries: Vec<MenuFileEntry> = serde_json::from_str(&raw)?;
    info!(count = entries.len(), "importing menu");

    for entry in entries {
        let sku = value_to_string(&entry.id);
        let product = NewProduct {
            slug: slugify(&entry.name),
            sku: sku.clone(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            price_minor: entry.price,
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "RUB".to_owned()),
        };
        let product_id = commerce.create_product(&product).await?;

        if let Some(image) = &entry.product_image {
            let bytes = http
                .get(&image.url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            let file_id = commerce
                .upload_image(&format!("{sku}.jpg"), bytes.to_vec())
                .await?;
            commerce.link_main_image(&product_id, &file_id).await?;
        }

        info!(product = %entry.name, id = %product_id, "imported");
    }

    Ok(())
}

/// Import an addresses file as fulfillment-location flow entries.
///
/// # Errors
///
/// Returns an error when an entry has no courier id (and no default was
/// given), or when the import fails.
pub async fn addresses(
    file: &str,
    default_courier: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let commerce = super::commerce_client_from_env()?;

    let raw = tokio::fs::read_to_string(file).await?;
    let entries: Vec<AddressFileEntry> = serde_json::from_str(&raw)?;
    info!(count = entries.len(), "importing addresses");

    for entry in entries {
        let courier_id = entry
            .courier_id
            .as_deref()
            .or(default_courier)
            .ok_or_else(|| {
                format!(
                    "entry {:?} has no courier_id and no --default-courier was given",
                    entry.alias
                )
            })?;

        let fields = serde_json::json!({
            "address": entry.address.full,
            "alias": entry.alias,
            "longitude": value_to_f64(&entry.coordinates.lon)?,
            "latitude": value_to_f64(&entry.coordinates.lat)?,
            "courier-id": courier_id,
        });
        let flow_slug = commerce.pizzeria_flow_slug().to_owned();
        let entry_id = commerce.create_flow_entry(&flow_slug, &fields).await?;
        info!(alias = %entry.alias, id = %entry_id, "imported");
    }

    Ok(())
}

/// Menu files carry ids as numbers or strings; flatten either to a string.
fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Address files carry coordinates as numbers or strings.
fn value_to_f64(value: &serde_json::Value) -> Result<f64, Box<dyn std::error::Error>> {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("not a finite number: {n}").into()),
        serde_json::Value::String(s) => Ok(s.parse()?),
        other => Err(format!("not a coordinate: {other}").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_to_string_accepts_numbers_and_strings() {
        assert_eq!(value_to_string(&serde_json::json!(20)), "20");
        assert_eq!(value_to_string(&serde_json::json!("abc")), "abc");
    }

    #[test]
    fn test_value_to_f64_accepts_numbers_and_strings() {
        assert!((value_to_f64(&serde_json::json!(37.62)).expect("number") - 37.62).abs() < 1e-9);
        assert!(
            (value_to_f64(&serde_json::json!("55.75")).expect("string") - 55.75).abs() < 1e-9
        );
        assert!(value_to_f64(&serde_json::json!(null)).is_err());
    }

    #[test]
    fn test_address_file_entry_parses() {
        let entry: AddressFileEntry = serde_json::from_value(serde_json::json!({
            "address": { "full": "1 Example Street" },
            "alias": "center",
            "coordinates": { "lon": "37.62", "lat": "55.75" }
        }))
        .expect("parses");
        assert_eq!(entry.alias, "center");
        assert!(entry.courier_id.is_none());
    }
}
