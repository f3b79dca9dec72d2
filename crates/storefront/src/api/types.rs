//! Wire types for the backend cart service.
//!
//! The cart API speaks camelCase JSON and carries minor-unit prices as
//! decimal strings (`unitPriceMinor: "10000"`). The payment reconciliation
//! endpoint is the one snake_case exception. Conversions into the domain
//! types live here so the client and the engine never touch raw strings.

use serde::{Deserialize, Serialize};

use hilo_core::{
    Breakdown, BuyerId, CartId, CartLine, CartLineSnapshot, CartStatus, CurrencyCode, ItemId,
    LineId, PaymentStatus, Price, ProductId, PromoKind, PromotionState, ShopId, VariantId,
};

use super::ApiError;

/// Price source marker for items added from the product catalog.
pub const PRICE_SOURCE_PRODUCT_BASE: &str = "PRODUCT_BASE";

// =============================================================================
// Carts and items
// =============================================================================

/// The open-cart lookup response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub id: CartId,
    pub status: CartStatus,
}

/// One cart item as the backend reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDto {
    pub id: ItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price_minor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CartItemMetadata>,
    pub product: ProductSummaryDto,
}

/// Free-form item metadata; only the variant id is meaningful here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
}

/// Product fields embedded in a cart item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummaryDto {
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub allows_local_pickup: bool,
}

impl CartItemDto {
    /// Convert a wire item into a domain cart line.
    pub fn into_line(self, currency: CurrencyCode) -> Result<CartLine, ApiError> {
        let amount_minor = self
            .unit_price_minor
            .parse::<i64>()
            .map_err(|_| ApiError::InvalidPrice(self.unit_price_minor.clone()))?;

        Ok(CartLine {
            id: LineId::server(self.id),
            product_id: self.product_id,
            variant_id: self.metadata.and_then(|m| m.variant_id),
            quantity: self.quantity,
            unit_price: Price::from_minor(amount_minor, currency),
            display_name: self.product.name,
            image_url: self.product.images.into_iter().next(),
            is_gift_card: false,
            gift_card_amount: None,
            recipient_email: None,
            gift_message: None,
        })
    }
}

/// Request body for the add-item operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub seller_shop_id: ShopId,
    pub quantity: u32,
    pub currency: CurrencyCode,
    pub unit_price_minor: String,
    pub price_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CartItemMetadata>,
}

impl AddCartItemRequest {
    /// Build an add-item request from product details at the catalog
    /// base price.
    #[must_use]
    pub fn from_product(
        cart_id: CartId,
        product: &ProductDetails,
        quantity: u32,
        variant_id: Option<VariantId>,
    ) -> Self {
        Self {
            cart_id,
            product_id: product.id,
            seller_shop_id: product.shop_id,
            quantity,
            currency: product.unit_price.currency_code,
            unit_price_minor: product.unit_price.amount_minor.to_string(),
            price_source: PRICE_SOURCE_PRODUCT_BASE.to_string(),
            metadata: variant_id.map(|variant_id| CartItemMetadata {
                variant_id: Some(variant_id),
            }),
        }
    }
}

/// Request body for the item-quantity update operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

// =============================================================================
// Guest cart sync
// =============================================================================

/// One guest line forwarded by the bulk sync operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncGuestCartItem {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

impl From<&CartLine> for SyncGuestCartItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id,
            variant_id: line.variant_id,
            quantity: line.quantity,
        }
    }
}

/// Request body for the bulk guest-cart sync operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncGuestCartRequest {
    pub buyer_user_id: BuyerId,
    pub items: Vec<SyncGuestCartItem>,
}

/// Response of the bulk guest-cart sync operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncGuestCartResponse {
    pub cart_id: CartId,
}

// =============================================================================
// Payment reconciliation
// =============================================================================

/// Request body for the post-payment reconciliation call.
///
/// This endpoint speaks snake_case, unlike the rest of the cart API.
#[derive(Debug, Clone, Serialize)]
pub struct SyncPaymentStatusRequest {
    pub cart_id: CartId,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_items: Option<Vec<CartLineSnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Breakdown>,
}

// =============================================================================
// Products and promos
// =============================================================================

/// Product details needed to mint a cart line.
#[derive(Debug, Clone)]
pub struct ProductDetails {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub name: String,
    pub unit_price: Price,
    pub image_url: Option<String>,
}

/// Wire shape of a product lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub name: String,
    pub unit_price_minor: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductDto {
    pub fn into_details(self, currency: CurrencyCode) -> Result<ProductDetails, ApiError> {
        let amount_minor = self
            .unit_price_minor
            .parse::<i64>()
            .map_err(|_| ApiError::InvalidPrice(self.unit_price_minor.clone()))?;
        Ok(ProductDetails {
            id: self.id,
            shop_id: self.shop_id,
            name: self.name,
            unit_price: Price::from_minor(amount_minor, currency),
            image_url: self.images.into_iter().next(),
        })
    }
}

/// Request body for promo-code validation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromoRequest {
    pub code: String,
    pub cart_total_minor: String,
    pub currency: CurrencyCode,
}

/// Response of promo-code validation, minor units on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromoResponse {
    pub code: String,
    pub kind: PromoKind,
    pub discount_minor: i64,
    pub new_total_minor: i64,
    #[serde(default)]
    pub remaining_balance_minor: Option<i64>,
}

impl ValidatePromoResponse {
    #[must_use]
    pub fn into_promotion(self, currency: CurrencyCode) -> PromotionState {
        PromotionState {
            code: self.code,
            kind: self.kind,
            discount_amount: Price::from_minor(self.discount_minor, currency),
            new_total: Price::from_minor(self.new_total_minor, currency),
            remaining_balance: self
                .remaining_balance_minor
                .map(|minor| Price::from_minor(minor, currency)),
        }
    }
}
