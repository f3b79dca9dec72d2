//! Reqwest implementation of the cart service client.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use hilo_core::{BuyerId, CartId, CartLine, CurrencyCode, ItemId, Price, ProductId, PromotionState};

use crate::config::StorefrontConfig;

use super::types::{
    AddCartItemRequest, CartItemDto, CartSummary, ProductDetails, ProductDto,
    SyncGuestCartRequest, SyncGuestCartResponse, SyncPaymentStatusRequest, UpdateCartItemRequest,
    ValidatePromoRequest, ValidatePromoResponse,
};
use super::{ApiError, CartBackend};

/// Product cache TTL. Catalog prices change rarely relative to cart traffic.
const PRODUCT_CACHE_TTL: Duration = Duration::from_secs(300);
const PRODUCT_CACHE_CAPACITY: u64 = 1000;

// =============================================================================
// CartApiClient
// =============================================================================

/// Client for the backend cart service.
///
/// Cheap to clone; product lookups are cached for 5 minutes.
#[derive(Clone)]
pub struct CartApiClient {
    inner: Arc<CartApiClientInner>,
}

struct CartApiClientInner {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    currency: CurrencyCode,
    product_cache: Cache<ProductId, ProductDetails>,
}

impl CartApiClient {
    /// Create a new cart service client from configuration.
    #[must_use]
    pub fn new(config: &StorefrontConfig) -> Self {
        let product_cache = Cache::builder()
            .max_capacity(PRODUCT_CACHE_CAPACITY)
            .time_to_live(PRODUCT_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(CartApiClientInner {
                client: reqwest::Client::new(),
                base_url: config.api_base_url.as_str().trim_end_matches('/').to_string(),
                access_token: config.api_token.expose_secret().to_string(),
                currency: config.currency,
                product_cache,
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Send a request and decode the JSON response body.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response_text = self.execute_raw(request).await?;
        match serde_json::from_str(&response_text) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse cart service response"
                );
                Err(ApiError::Parse(e))
            }
        }
    }

    /// Send a request, map error statuses, and return the raw body.
    async fn execute_raw(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request
            .bearer_auth(&self.inner.access_token)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(
                response_text.chars().take(200).collect(),
            ));
        }
        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Cart service returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: response_text.chars().take(200).collect(),
            });
        }

        Ok(response_text)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(self.inner.client.post(self.url(path)).json(body))
            .await
    }
}

impl CartBackend for CartApiClient {
    #[instrument(skip(self), fields(buyer_id = %buyer_id))]
    async fn get_open_cart(&self, buyer_id: BuyerId) -> Result<CartSummary, ApiError> {
        self.execute(
            self.inner
                .client
                .get(self.url("/carts/open"))
                .query(&[("buyerId", buyer_id.to_string())]),
        )
        .await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn get_cart_items(&self, cart_id: CartId) -> Result<Vec<CartLine>, ApiError> {
        let items: Vec<CartItemDto> = self
            .execute(
                self.inner
                    .client
                    .get(self.url(&format!("/carts/{cart_id}/items"))),
            )
            .await?;

        items
            .into_iter()
            .map(|item| item.into_line(self.inner.currency))
            .collect()
    }

    #[instrument(skip(self, request), fields(cart_id = %request.cart_id, product_id = %request.product_id))]
    async fn add_cart_item(&self, request: &AddCartItemRequest) -> Result<(), ApiError> {
        self.execute_raw(self.inner.client.post(self.url("/cart-items")).json(request))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn update_cart_item(&self, item_id: ItemId, quantity: u32) -> Result<(), ApiError> {
        self.execute_raw(
            self.inner
                .client
                .patch(self.url(&format!("/cart-items/{item_id}")))
                .json(&UpdateCartItemRequest { quantity }),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn delete_cart_item(&self, item_id: ItemId) -> Result<(), ApiError> {
        self.execute_raw(
            self.inner
                .client
                .delete(self.url(&format!("/cart-items/{item_id}"))),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(buyer_id = %request.buyer_user_id, items = request.items.len()))]
    async fn sync_guest_cart(&self, request: &SyncGuestCartRequest) -> Result<CartId, ApiError> {
        let response: SyncGuestCartResponse =
            self.post_json("/carts/sync-guest-cart", request).await?;
        Ok(response.cart_id)
    }

    #[instrument(skip(self, request), fields(cart_id = %request.cart_id, payment_status = ?request.payment_status))]
    async fn sync_payment_status(
        &self,
        request: &SyncPaymentStatusRequest,
    ) -> Result<(), ApiError> {
        self.execute_raw(
            self.inner
                .client
                .post(self.url("/payments/sync-status"))
                .json(request),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: ProductId) -> Result<ProductDetails, ApiError> {
        if let Some(product) = self.inner.product_cache.get(&product_id).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let dto: ProductDto = self
            .execute(
                self.inner
                    .client
                    .get(self.url(&format!("/products/{product_id}"))),
            )
            .await?;
        let product = dto.into_details(self.inner.currency)?;

        self.inner
            .product_cache
            .insert(product_id, product.clone())
            .await;

        Ok(product)
    }

    #[instrument(skip(self, code))]
    async fn validate_promo(
        &self,
        code: &str,
        cart_total: Price,
    ) -> Result<PromotionState, ApiError> {
        let request = ValidatePromoRequest {
            code: code.to_string(),
            cart_total_minor: cart_total.amount_minor.to_string(),
            currency: cart_total.currency_code,
        };
        let response: ValidatePromoResponse = self
            .post_json("/promo-codes/validate", &request)
            .await
            .map_err(|e| match e {
                // The backend signals an unknown or exhausted code as 404.
                ApiError::NotFound(_) => ApiError::InvalidPromoCode(code.to_string()),
                other => other,
            })?;
        Ok(response.into_promotion(cart_total.currency_code))
    }
}

impl std::fmt::Debug for CartApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartApiClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}
