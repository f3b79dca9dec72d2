//! In-memory fakes of the external collaborators.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use url::Url;

use hilo_core::{
    BuyerId, CartId, CartLine, CartStatus, CurrencyCode, ItemId, LineId, PaymentStatus, Price,
    ProductId, PromoKind, PromotionState, ShopId, VariantId,
};

use crate::api::{
    AddCartItemRequest, ApiError, CartBackend, CartSummary, ProductDetails,
    SyncGuestCartRequest, SyncPaymentStatusRequest,
};
use crate::gateway::{CreateCheckoutRequest, GatewayError, LinkOpener, PaymentGateway};
use crate::storage::{StorageTiers, keys};

// =============================================================================
// FakeBackend
// =============================================================================

#[derive(Debug, Clone)]
struct FakeItem {
    id: ItemId,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: u32,
    unit_price_minor: i64,
}

#[derive(Debug, Default)]
struct BackendState {
    products: HashMap<ProductId, ProductDetails>,
    carts: HashMap<BuyerId, CartId>,
    statuses: HashMap<CartId, CartStatus>,
    items: HashMap<CartId, Vec<FakeItem>>,
    promos: HashMap<String, i64>,
    sync_guest_cart_calls: usize,
    payment_syncs: Vec<SyncPaymentStatusRequest>,
    fail_sync_guest_cart: bool,
    fail_sync_payment_status: bool,
}

/// Backend cart service fake honoring the real add-item contract:
/// duplicate product+variant pairs are merged by summing quantity.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buyer() -> BuyerId {
        BuyerId::new(uuid::Uuid::new_v4())
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    pub fn insert_product(&self, name: &str, price_minor: i64) -> ProductId {
        let id = ProductId::new(uuid::Uuid::new_v4());
        self.state().products.insert(
            id,
            ProductDetails {
                id,
                shop_id: ShopId::new(uuid::Uuid::new_v4()),
                name: name.to_string(),
                unit_price: Price::from_minor(price_minor, CurrencyCode::COP),
                image_url: None,
            },
        );
        id
    }

    pub fn insert_promo(&self, code: &str, discount_minor: i64) {
        self.state().promos.insert(code.to_string(), discount_minor);
    }

    pub fn open_cart_for(&self, buyer_id: BuyerId) -> CartId {
        let cart_id = CartId::new(uuid::Uuid::new_v4());
        let mut state = self.state();
        state.carts.insert(buyer_id, cart_id);
        state.statuses.insert(cart_id, CartStatus::Open);
        state.items.entry(cart_id).or_default();
        cart_id
    }

    pub fn seed_item(&self, cart_id: CartId, product_id: ProductId, quantity: u32) {
        let mut state = self.state();
        let unit_price_minor = state.products[&product_id].unit_price.amount_minor;
        state.items.entry(cart_id).or_default().push(FakeItem {
            id: ItemId::new(uuid::Uuid::new_v4()),
            product_id,
            variant_id: None,
            quantity,
            unit_price_minor,
        });
    }

    pub fn set_cart_status(&self, cart_id: CartId, status: CartStatus) {
        self.state().statuses.insert(cart_id, status);
    }

    pub fn items_in(&self, cart_id: CartId) -> Vec<(ProductId, u32)> {
        self.state()
            .items
            .get(&cart_id)
            .map(|items| {
                items
                    .iter()
                    .map(|item| (item.product_id, item.quantity))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn sync_guest_cart_calls(&self) -> usize {
        self.state().sync_guest_cart_calls
    }

    pub fn fail_sync_guest_cart(&self, fail: bool) {
        self.state().fail_sync_guest_cart = fail;
    }

    pub fn sync_payment_status_calls(&self) -> usize {
        self.state().payment_syncs.len()
    }

    pub fn fail_sync_payment_status(&self, fail: bool) {
        self.state().fail_sync_payment_status = fail;
    }

    pub fn last_payment_sync(&self) -> Option<SyncPaymentStatusRequest> {
        self.state().payment_syncs.last().cloned()
    }

    fn merge_item(
        items: &mut Vec<FakeItem>,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
        unit_price_minor: i64,
    ) {
        if let Some(item) = items
            .iter_mut()
            .find(|item| item.product_id == product_id && item.variant_id == variant_id)
        {
            item.quantity += quantity;
        } else {
            items.push(FakeItem {
                id: ItemId::new(uuid::Uuid::new_v4()),
                product_id,
                variant_id,
                quantity,
                unit_price_minor,
            });
        }
    }
}

impl CartBackend for FakeBackend {
    async fn get_open_cart(&self, buyer_id: BuyerId) -> Result<CartSummary, ApiError> {
        let state = self.state();
        let cart_id = state
            .carts
            .get(&buyer_id)
            .copied()
            .ok_or_else(|| ApiError::NotFound(format!("no open cart for {buyer_id}")))?;
        Ok(CartSummary {
            id: cart_id,
            status: state.statuses[&cart_id],
        })
    }

    async fn get_cart_items(&self, cart_id: CartId) -> Result<Vec<CartLine>, ApiError> {
        let state = self.state();
        let items = state
            .items
            .get(&cart_id)
            .ok_or_else(|| ApiError::NotFound(format!("cart {cart_id}")))?;
        Ok(items
            .iter()
            .map(|item| CartLine {
                id: LineId::server(item.id),
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                unit_price: Price::from_minor(item.unit_price_minor, CurrencyCode::COP),
                display_name: state
                    .products
                    .get(&item.product_id)
                    .map_or_else(|| "product".to_string(), |p| p.name.clone()),
                image_url: None,
                is_gift_card: false,
                gift_card_amount: None,
                recipient_email: None,
                gift_message: None,
            })
            .collect())
    }

    async fn add_cart_item(&self, request: &AddCartItemRequest) -> Result<(), ApiError> {
        let mut state = self.state();
        let unit_price_minor = request
            .unit_price_minor
            .parse::<i64>()
            .map_err(|_| ApiError::InvalidPrice(request.unit_price_minor.clone()))?;
        let variant_id = request.metadata.as_ref().and_then(|m| m.variant_id);
        let items = state.items.entry(request.cart_id).or_default();
        Self::merge_item(
            items,
            request.product_id,
            variant_id,
            request.quantity,
            unit_price_minor,
        );
        Ok(())
    }

    async fn update_cart_item(&self, item_id: ItemId, quantity: u32) -> Result<(), ApiError> {
        let mut state = self.state();
        for items in state.items.values_mut() {
            if let Some(item) = items.iter_mut().find(|item| item.id == item_id) {
                item.quantity = quantity;
                return Ok(());
            }
        }
        Err(ApiError::NotFound(format!("item {item_id}")))
    }

    async fn delete_cart_item(&self, item_id: ItemId) -> Result<(), ApiError> {
        let mut state = self.state();
        for items in state.items.values_mut() {
            let before = items.len();
            items.retain(|item| item.id != item_id);
            if items.len() < before {
                return Ok(());
            }
        }
        Err(ApiError::NotFound(format!("item {item_id}")))
    }

    async fn sync_guest_cart(&self, request: &SyncGuestCartRequest) -> Result<CartId, ApiError> {
        let mut state = self.state();
        state.sync_guest_cart_calls += 1;
        if state.fail_sync_guest_cart {
            return Err(ApiError::Status {
                status: 500,
                message: "sync failed".to_string(),
            });
        }

        let cart_id = state
            .carts
            .get(&request.buyer_user_id)
            .copied()
            .unwrap_or_else(|| CartId::new(uuid::Uuid::new_v4()));
        state.carts.insert(request.buyer_user_id, cart_id);
        state.statuses.entry(cart_id).or_insert(CartStatus::Open);

        for item in &request.items {
            let unit_price_minor = state
                .products
                .get(&item.product_id)
                .map_or(0, |p| p.unit_price.amount_minor);
            let items = state.items.entry(cart_id).or_default();
            Self::merge_item(
                items,
                item.product_id,
                item.variant_id,
                item.quantity,
                unit_price_minor,
            );
        }
        state.items.entry(cart_id).or_default();
        Ok(cart_id)
    }

    async fn sync_payment_status(
        &self,
        request: &SyncPaymentStatusRequest,
    ) -> Result<(), ApiError> {
        let mut state = self.state();
        state.payment_syncs.push(request.clone());
        if state.fail_sync_payment_status {
            return Err(ApiError::Status {
                status: 502,
                message: "reconciliation unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<ProductDetails, ApiError> {
        self.state()
            .products
            .get(&product_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("product {product_id}")))
    }

    async fn validate_promo(
        &self,
        code: &str,
        cart_total: Price,
    ) -> Result<PromotionState, ApiError> {
        let state = self.state();
        let discount_minor = *state
            .promos
            .get(code)
            .ok_or_else(|| ApiError::InvalidPromoCode(code.to_string()))?;
        let discount = Price::from_minor(discount_minor, cart_total.currency_code);
        Ok(PromotionState {
            code: code.to_string(),
            kind: PromoKind::Coupon,
            discount_amount: discount,
            new_total: cart_total.saturating_sub(discount),
            remaining_balance: None,
        })
    }
}

// =============================================================================
// FakeGateway
// =============================================================================

#[derive(Debug, Default)]
struct GatewayState {
    queue: Mutex<VecDeque<PaymentStatus>>,
    notify: Notify,
    create_checkout_calls: Mutex<usize>,
    fail_create_checkout: AtomicBool,
    probe: Mutex<Option<StorageTiers>>,
    probe_saw_pending_keys: AtomicBool,
}

/// Payment gateway fake: checkout-link creation plus a pushable status
/// feed consumed by the polling subscription.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<GatewayState>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_status(&self, status: PaymentStatus) {
        self.state.queue.lock().unwrap().push_back(status);
        self.state.notify.notify_waiters();
    }

    pub fn create_checkout_calls(&self) -> usize {
        *self.state.create_checkout_calls.lock().unwrap()
    }

    pub fn fail_create_checkout(&self, fail: bool) {
        self.state
            .fail_create_checkout
            .store(fail, Ordering::SeqCst);
    }

    /// Record, at `create_checkout` time, whether the pending checkout
    /// keys had already been written to `storage`.
    pub fn observe_storage(&self, storage: StorageTiers) {
        *self.state.probe.lock().unwrap() = Some(storage);
    }

    pub fn pending_keys_were_set_at_call_time(&self) -> bool {
        self.state.probe_saw_pending_keys.load(Ordering::SeqCst)
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_checkout(&self, _request: &CreateCheckoutRequest) -> Result<Url, GatewayError> {
        *self.state.create_checkout_calls.lock().unwrap() += 1;
        if let Some(storage) = self.state.probe.lock().unwrap().as_ref() {
            let present = storage
                .durable
                .get(keys::PENDING_CART_ID)
                .unwrap()
                .is_some();
            self.state
                .probe_saw_pending_keys
                .store(present, Ordering::SeqCst);
        }
        if self.state.fail_create_checkout.load(Ordering::SeqCst) {
            return Err(GatewayError::Status {
                status: 502,
                message: "provider unavailable".to_string(),
            });
        }
        Ok(Url::parse(&format!(
            "https://pay.example/checkout/{}",
            uuid::Uuid::new_v4()
        ))
        .unwrap())
    }

    async fn fetch_status(&self, _cart_id: CartId) -> Result<PaymentStatus, GatewayError> {
        loop {
            let notified = self.state.notify.notified();
            if let Some(status) = self.state.queue.lock().unwrap().pop_front() {
                return Ok(status);
            }
            notified.await;
        }
    }
}

// =============================================================================
// FakeOpener
// =============================================================================

/// Link opener fake; can simulate a blocked browsing context.
#[derive(Debug, Default)]
pub struct FakeOpener {
    opened: Mutex<Vec<Url>>,
    blocked: AtomicBool,
}

impl FakeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().unwrap().clone()
    }
}

impl LinkOpener for FakeOpener {
    fn open(&self, url: &Url) -> Result<(), GatewayError> {
        if self.blocked.load(Ordering::SeqCst) {
            return Err(GatewayError::OpenBlocked);
        }
        self.opened.lock().unwrap().push(url.clone());
        Ok(())
    }
}
