//! Backend cart service client.
//!
//! # Architecture
//!
//! - The backend is the source of truth for authenticated carts - NO local
//!   sync, direct API calls after every mutation
//! - JSON REST via `reqwest`; camelCase on the wire, `unitPriceMinor` as a
//!   decimal string
//! - In-memory caching via `moka` for product lookups (5 minute TTL)
//!
//! The [`CartBackend`] trait is the seam the reconciliation engine is
//! generic over; [`CartApiClient`] is the production implementation and
//! tests substitute an in-memory fake.

mod client;
pub mod types;

pub use client::CartApiClient;
pub use types::*;

use thiserror::Error;

use hilo_core::{BuyerId, CartId, CartLine, ItemId, Price, ProductId, PromotionState};

/// Errors that can occur when talking to the backend cart service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status with a response body.
    #[error("API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The wire carried an unparseable minor-unit price string.
    #[error("Invalid price value: {0}")]
    InvalidPrice(String),

    /// Promo code rejected by the backend.
    #[error("Invalid promo code: {0}")]
    InvalidPromoCode(String),
}

impl ApiError {
    /// "Not found" is a signal, not a failure, in several engine paths
    /// (a buyer with no open cart simply has an empty session).
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Operations the backend cart service exposes.
///
/// The add-item contract includes server-side merging of duplicate
/// product+variant pairs by summing quantity; the engine relies on that
/// rather than reimplementing it.
#[allow(async_fn_in_trait)]
pub trait CartBackend {
    /// Look up the buyer's open cart. `NotFound` when none exists.
    async fn get_open_cart(&self, buyer_id: BuyerId) -> Result<CartSummary, ApiError>;

    /// List the authoritative line items of a cart.
    async fn get_cart_items(&self, cart_id: CartId) -> Result<Vec<CartLine>, ApiError>;

    /// Add one item to a cart.
    async fn add_cart_item(&self, request: &AddCartItemRequest) -> Result<(), ApiError>;

    /// Change an item's quantity.
    async fn update_cart_item(&self, item_id: ItemId, quantity: u32) -> Result<(), ApiError>;

    /// Delete an item.
    async fn delete_cart_item(&self, item_id: ItemId) -> Result<(), ApiError>;

    /// Bulk-replace the buyer's cart with guest lines, materializing a
    /// cart record if needed. An empty item list is legal.
    async fn sync_guest_cart(&self, request: &SyncGuestCartRequest) -> Result<CartId, ApiError>;

    /// Best-effort post-payment reconciliation. The server-side webhook
    /// is authoritative; callers treat failures here as non-fatal.
    async fn sync_payment_status(
        &self,
        request: &SyncPaymentStatusRequest,
    ) -> Result<(), ApiError>;

    /// Fetch product details (name, price, shop) for minting cart lines.
    async fn get_product(&self, product_id: ProductId) -> Result<ProductDetails, ApiError>;

    /// Validate a promo code against the current cart total.
    async fn validate_promo(
        &self,
        code: &str,
        cart_total: Price,
    ) -> Result<PromotionState, ApiError>;
}
