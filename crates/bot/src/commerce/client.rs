//! HTTP client for the commerce service.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::Method;
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use pronto_core::cart::CartSummary;
use pronto_core::catalog::{Category, Product};

use super::auth::{AccessToken, fetch_token};
use super::types::{CartEnvelope, CategoryData, Envelope, FileData, ProductData};
use super::{Commerce, CommerceError};

/// Catalog cache TTL. Carts are never cached.
const CATALOG_CACHE_TTL: Duration = Duration::from_secs(300);

/// Commerce service connection settings.
#[derive(Clone)]
pub struct CommerceConfig {
    /// API origin, e.g. `https://api.moltin.com`.
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Flow slug holding fulfillment locations.
    pub pizzeria_flow_slug: String,
    /// Flow slug holding appended customer locations.
    pub customer_location_flow_slug: String,
}

impl std::fmt::Debug for CommerceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("pizzeria_flow_slug", &self.pizzeria_flow_slug)
            .field(
                "customer_location_flow_slug",
                &self.customer_location_flow_slug,
            )
            .finish()
    }
}

/// A new catalog product (seeding only).
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    /// Price in the currency's smallest unit.
    pub price_minor: i64,
    pub currency: String,
}

#[derive(Clone)]
enum CacheValue {
    Products(Vec<Product>),
    Categories(Vec<Category>),
    ImageUrl(String),
}

/// Client for the commerce service.
///
/// Cheaply cloneable; all clones share one HTTP pool, token cache, and
/// catalog cache.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    config: CommerceConfig,
    token: RwLock<Option<AccessToken>>,
    cache: Cache<String, CacheValue>,
}

impl CommerceClient {
    /// Create a new client. No network traffic happens until the first
    /// call.
    #[must_use]
    pub fn new(config: CommerceConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(CATALOG_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(CommerceClientInner {
                client: reqwest::Client::new(),
                config,
                token: RwLock::new(None),
                cache,
            }),
        }
    }

    /// Current `Authorization` header value, refreshing the token if the
    /// cached one is missing or about to expire.
    async fn authorization(&self) -> Result<String, CommerceError> {
        use secrecy::ExposeSecret;

        let now = chrono::Utc::now().timestamp();
        if let Some(token) = self.inner.token.read().await.as_ref()
            && token.is_valid(now)
        {
            return Ok(token.header_value.expose_secret().to_owned());
        }

        let token = fetch_token(
            &self.inner.client,
            &self.inner.config.base_url,
            &self.inner.config.client_id,
            &self.inner.config.client_secret,
        )
        .await?;
        let header = token.header_value.expose_secret().to_owned();
        *self.inner.token.write().await = Some(token);
        Ok(header)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{path}", self.inner.config.base_url)
    }

    /// Execute a request and parse the JSON response.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, CommerceError> {
        let text = self.request_raw(method, path, body).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Execute a request where the response body does not matter.
    async fn request_unit(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(), CommerceError> {
        self.request_raw(method, path, body).await.map(|_| ())
    }

    async fn request_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<String, CommerceError> {
        let authorization = self.authorization().await?;
        let mut request = self
            .inner
            .client
            .request(method, self.url(path))
            .header("Authorization", authorization);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CommerceError::NotFound(path.to_owned()));
        }
        if !status.is_success() {
            tracing::error!(
                status = %status,
                path = %path,
                body = %text.chars().take(500).collect::<String>(),
                "commerce API returned non-success status"
            );
            return Err(CommerceError::Api {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        Ok(text)
    }

    // =========================================================================
    // Flows (fulfillment locations, customer location history)
    // =========================================================================

    /// List a flow's entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the entries do not parse.
    pub async fn flow_entries<T: DeserializeOwned>(
        &self,
        flow_slug: &str,
    ) -> Result<Vec<T>, CommerceError> {
        let envelope: Envelope<Vec<T>> = self
            .request(Method::GET, &format!("flows/{flow_slug}/entries"), None)
            .await?;
        Ok(envelope.data)
    }

    /// Fetch one flow entry by id.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` for an unknown entry id.
    pub async fn flow_entry<T: DeserializeOwned>(
        &self,
        flow_slug: &str,
        entry_id: &str,
    ) -> Result<T, CommerceError> {
        let envelope: Envelope<T> = self
            .request(
                Method::GET,
                &format!("flows/{flow_slug}/entries/{entry_id}"),
                None,
            )
            .await?;
        Ok(envelope.data)
    }

    /// Append a flow entry. Entries are never updated in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, fields), fields(flow = %flow_slug))]
    pub async fn create_flow_entry(
        &self,
        flow_slug: &str,
        fields: &serde_json::Value,
    ) -> Result<String, CommerceError> {
        let mut data = serde_json::json!({ "type": "entry" });
        if let (Some(data_map), Some(field_map)) = (data.as_object_mut(), fields.as_object()) {
            for (key, value) in field_map {
                data_map.insert(key.clone(), value.clone());
            }
        }

        let envelope: Envelope<serde_json::Value> = self
            .request(
                Method::POST,
                &format!("flows/{flow_slug}/entries"),
                Some(&serde_json::json!({ "data": data })),
            )
            .await?;
        envelope
            .data
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_owned)
            .ok_or_else(|| CommerceError::NotFound("created entry id".to_owned()))
    }

    /// Flow slug holding fulfillment locations.
    #[must_use]
    pub fn pizzeria_flow_slug(&self) -> &str {
        &self.inner.config.pizzeria_flow_slug
    }

    /// Flow slug holding customer location history.
    #[must_use]
    pub fn customer_location_flow_slug(&self) -> &str {
        &self.inner.config.customer_location_flow_slug
    }

    // =========================================================================
    // Catalog seeding (CLI only)
    // =========================================================================

    /// Create a catalog product, returning its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<String, CommerceError> {
        let body = serde_json::json!({
            "data": {
                "type": "product",
                "name": product.name,
                "slug": product.slug,
                "sku": product.sku,
                "description": product.description,
                "manage_stock": false,
                "price": [{
                    "amount": product.price_minor,
                    "currency": product.currency,
                    "includes_tax": true,
                }],
                "status": "live",
                "commodity_type": "physical",
            }
        });
        let envelope: Envelope<serde_json::Value> =
            self.request(Method::POST, "products", Some(&body)).await?;
        envelope
            .data
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_owned)
            .ok_or_else(|| CommerceError::NotFound("created product id".to_owned()))
    }

    /// Upload an image and return its file id.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    #[instrument(skip(self, bytes), fields(file_name = %file_name, size = bytes.len()))]
    pub async fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, CommerceError> {
        let authorization = self.authorization().await?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_owned());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("public", "true");

        let response = self
            .inner
            .client
            .post(self.url("files"))
            .header("Authorization", authorization)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CommerceError::Api {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        let envelope: Envelope<serde_json::Value> = serde_json::from_str(&text)?;
        envelope
            .data
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_owned)
            .ok_or_else(|| CommerceError::NotFound("uploaded file id".to_owned()))
    }

    /// Link an uploaded image as a product's main image.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn link_main_image(
        &self,
        product_id: &str,
        file_id: &str,
    ) -> Result<(), CommerceError> {
        let body = serde_json::json!({
            "data": { "type": "main_image", "id": file_id }
        });
        self.request_unit(
            Method::POST,
            &format!("products/{product_id}/relationships/main-image"),
            Some(&body),
        )
        .await
    }
}

#[async_trait::async_trait]
impl Commerce for CommerceClient {
    #[instrument(skip(self))]
    async fn products(&self, category_id: Option<&str>) -> Result<Vec<Product>, CommerceError> {
        let cache_key = format!("products:{}", category_id.unwrap_or(""));
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await {
            debug!("cache hit for products");
            return Ok(products);
        }

        let path = category_id.map_or_else(
            || "products".to_owned(),
            |id| format!("products?filter=eq(category.id,{id})"),
        );
        let envelope: Envelope<Vec<ProductData>> = self.request(Method::GET, &path, None).await?;
        let products: Vec<Product> = envelope.data.into_iter().map(Product::from).collect();

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn product(&self, product_id: &str) -> Result<Product, CommerceError> {
        let envelope: Envelope<ProductData> = self
            .request(Method::GET, &format!("products/{product_id}"), None)
            .await?;
        Ok(Product::from(envelope.data))
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<Category>, CommerceError> {
        let cache_key = "categories".to_owned();
        if let Some(CacheValue::Categories(categories)) = self.inner.cache.get(&cache_key).await {
            debug!("cache hit for categories");
            return Ok(categories);
        }

        let envelope: Envelope<Vec<CategoryData>> =
            self.request(Method::GET, "categories", None).await?;
        let categories: Vec<Category> = envelope.data.into_iter().map(Category::from).collect();

        self.inner
            .cache
            .insert(cache_key, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    async fn image_url(&self, file_id: &str) -> Result<String, CommerceError> {
        let cache_key = format!("image:{file_id}");
        if let Some(CacheValue::ImageUrl(url)) = self.inner.cache.get(&cache_key).await {
            return Ok(url);
        }

        let envelope: Envelope<FileData> = self
            .request(Method::GET, &format!("files/{file_id}"), None)
            .await?;
        let url = envelope.data.link.href;

        self.inner
            .cache
            .insert(cache_key, CacheValue::ImageUrl(url.clone()))
            .await;

        Ok(url)
    }

    #[instrument(skip(self), fields(cart_owner = %cart_owner))]
    async fn cart(&self, cart_owner: &str) -> Result<CartSummary, CommerceError> {
        let envelope: CartEnvelope = self
            .request(Method::GET, &format!("carts/{cart_owner}/items"), None)
            .await?;
        Ok(CartSummary::from(envelope))
    }

    #[instrument(skip(self), fields(cart_owner = %cart_owner, product_id = %product_id))]
    async fn add_cart_item(
        &self,
        cart_owner: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<(), CommerceError> {
        let body = serde_json::json!({
            "data": { "id": product_id, "type": "cart_item", "quantity": quantity }
        });
        self.request_unit(
            Method::POST,
            &format!("carts/{cart_owner}/items"),
            Some(&body),
        )
        .await
    }

    #[instrument(skip(self), fields(cart_owner = %cart_owner, sku = %sku))]
    async fn add_custom_item(
        &self,
        cart_owner: &str,
        name: &str,
        sku: &str,
        price_minor: i64,
    ) -> Result<(), CommerceError> {
        let body = serde_json::json!({
            "data": {
                "type": "custom_item",
                "name": name,
                "sku": sku,
                "quantity": 1,
                "price": { "amount": price_minor },
            }
        });
        self.request_unit(
            Method::POST,
            &format!("carts/{cart_owner}/items"),
            Some(&body),
        )
        .await
    }

    #[instrument(skip(self), fields(cart_owner = %cart_owner, item_id = %item_id))]
    async fn remove_cart_item(
        &self,
        cart_owner: &str,
        item_id: &str,
    ) -> Result<(), CommerceError> {
        self.request_unit(
            Method::DELETE,
            &format!("carts/{cart_owner}/items/{item_id}"),
            None,
        )
        .await
    }

    #[instrument(skip(self), fields(cart_owner = %cart_owner))]
    async fn delete_cart(&self, cart_owner: &str) -> Result<(), CommerceError> {
        self.request_unit(Method::DELETE, &format!("carts/{cart_owner}"), None)
            .await
    }
}
