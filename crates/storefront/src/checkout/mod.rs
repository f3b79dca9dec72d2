//! Checkout orchestration.
//!
//! Turns a [`CartSession`] into a payment-provider redirect: computes the
//! payable total (promotions never touch gift-card lines), freezes a
//! snapshot of the catalog lines plus the amount breakdown into storage
//! *before* contacting the gateway, then requests and opens the hosted
//! checkout link. Failures at any point roll the pending keys back; a
//! failed checkout never leaves partial state behind.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use hilo_core::{
    Breakdown, CartId, CartLineSnapshot, CurrencyCode, Price, ProviderCode, PromotionState,
};

use crate::api::CartBackend;
use crate::cart::CartSession;
use crate::error::{AppError, Result};
use crate::gateway::{CreateCheckoutRequest, LinkOpener, PaymentGateway};
use crate::storage::{StorageTiers, keys};

/// Pending-checkout record persisted across the redirect round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCheckout {
    pub cart_id: CartId,
    pub created_at: DateTime<Utc>,
}

/// Orchestrates the session-to-gateway handoff.
pub struct CheckoutOrchestrator<B, G> {
    backend: B,
    gateway: G,
    opener: Arc<dyn LinkOpener>,
    storage: StorageTiers,
    return_url: Url,
    currency: CurrencyCode,
}

impl<B: CartBackend, G: PaymentGateway> CheckoutOrchestrator<B, G> {
    pub fn new(
        backend: B,
        gateway: G,
        opener: Arc<dyn LinkOpener>,
        storage: StorageTiers,
        return_url: Url,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            backend,
            gateway,
            opener,
            storage,
            return_url,
            currency,
        }
    }

    /// Compute the payable amount breakdown.
    ///
    /// `paid_amount = (regular_subtotal - discount).max(0) + gift_card_subtotal`.
    /// The promotion applies only to the catalog subtotal; the gift-card
    /// component is never discounted, regardless of the promotion input.
    #[must_use]
    pub fn compute_final_total(
        &self,
        session: &CartSession,
        promotion: Option<&PromotionState>,
    ) -> Breakdown {
        let subtotal = session.regular_subtotal(self.currency);
        let gift_card_total = session.gift_card_subtotal(self.currency);

        let requested_discount = promotion
            .map_or_else(|| Price::zero(self.currency), |p| p.discount_amount);
        let discounted = subtotal.saturating_sub(requested_discount);
        // The discount actually granted, clamped so it never exceeds the
        // catalog subtotal and never goes negative.
        let discount = subtotal.saturating_sub(discounted);

        let paid_amount = discounted.saturating_add(gift_card_total);

        Breakdown {
            subtotal,
            discount,
            gift_card_total,
            paid_amount,
        }
    }

    /// Validate a promo code against the current catalog subtotal.
    #[instrument(skip(self, session, code))]
    pub async fn validate_promo(
        &self,
        session: &CartSession,
        code: &str,
    ) -> Result<PromotionState> {
        let subtotal = session.regular_subtotal(self.currency);
        Ok(self.backend.validate_promo(code, subtotal).await?)
    }

    /// Request a hosted checkout link and open it.
    ///
    /// Non-positive totals are rejected before any network call; they
    /// belong to a separate zero-payment path. The snapshot, breakdown,
    /// and pending cart id are persisted first so they survive the
    /// redirect to the provider and back. A gateway failure or a blocked
    /// open rolls those keys back - the attempt never started.
    #[instrument(skip(self, session, promotion), fields(provider = ?provider))]
    pub async fn create_checkout_link(
        &self,
        session: &CartSession,
        provider: ProviderCode,
        promotion: Option<&PromotionState>,
    ) -> Result<Url> {
        let breakdown = self.compute_final_total(session, promotion);
        if !breakdown.paid_amount.is_positive() {
            return Err(AppError::NonPositiveAmount(breakdown.paid_amount));
        }
        let cart_id = session.cart_id.ok_or(AppError::MissingCart)?;

        let snapshot: Vec<CartLineSnapshot> =
            session.regular_lines().map(CartLineSnapshot::from).collect();
        StorageTiers::set_json(
            self.storage.durable.as_ref(),
            keys::PENDING_CART_ID,
            &PendingCheckout {
                cart_id,
                created_at: Utc::now(),
            },
        )?;
        StorageTiers::set_json(
            self.storage.durable.as_ref(),
            keys::PENDING_BREAKDOWN,
            &breakdown,
        )?;
        StorageTiers::set_json(
            self.storage.ephemeral.as_ref(),
            keys::CART_SNAPSHOT,
            &snapshot,
        )?;

        let request = CreateCheckoutRequest::new(
            cart_id,
            breakdown.paid_amount,
            provider,
            self.return_url.clone(),
        );
        let checkout_url = match self.gateway.create_checkout(&request).await {
            Ok(url) => url,
            Err(e) => {
                self.storage.clear_checkout_state()?;
                return Err(e.into());
            }
        };

        if let Err(e) = self.opener.open(&checkout_url) {
            self.storage.clear_checkout_state()?;
            return Err(e.into());
        }

        Ok(checkout_url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hilo_core::{CartId, CartLine, LineId, ProductId, PromoKind, SessionStatus};

    use crate::testutil::{FakeBackend, FakeGateway, FakeOpener};

    use super::*;

    fn cop(minor: i64) -> Price {
        Price::from_minor(minor, CurrencyCode::COP)
    }

    fn regular_line(price_minor: i64, quantity: u32) -> CartLine {
        CartLine {
            id: LineId::mint_local(),
            product_id: ProductId::new(uuid::Uuid::new_v4()),
            variant_id: None,
            quantity,
            unit_price: cop(price_minor),
            display_name: "item".to_string(),
            image_url: None,
            is_gift_card: false,
            gift_card_amount: None,
            recipient_email: None,
            gift_message: None,
        }
    }

    fn gift_line(amount_minor: i64) -> CartLine {
        CartLine {
            id: LineId::mint_gift_card(),
            product_id: ProductId::new(uuid::Uuid::new_v4()),
            variant_id: None,
            quantity: 1,
            unit_price: cop(amount_minor),
            display_name: "Gift card".to_string(),
            image_url: None,
            is_gift_card: true,
            gift_card_amount: Some(cop(amount_minor)),
            recipient_email: None,
            gift_message: None,
        }
    }

    fn coupon(discount_minor: i64) -> PromotionState {
        PromotionState {
            code: "SAVE".to_string(),
            kind: PromoKind::Coupon,
            discount_amount: cop(discount_minor),
            new_total: cop(0),
            remaining_balance: None,
        }
    }

    struct Fixture {
        orchestrator: CheckoutOrchestrator<FakeBackend, FakeGateway>,
        gateway: FakeGateway,
        opener: Arc<FakeOpener>,
        storage: StorageTiers,
    }

    fn fixture() -> Fixture {
        let gateway = FakeGateway::new();
        let opener = Arc::new(FakeOpener::new());
        let storage = StorageTiers::in_memory();
        let orchestrator = CheckoutOrchestrator::new(
            FakeBackend::new(),
            gateway.clone(),
            opener.clone(),
            storage.clone(),
            Url::parse("https://shop.example/payment/pending").unwrap(),
            CurrencyCode::COP,
        );
        Fixture {
            orchestrator,
            gateway,
            opener,
            storage,
        }
    }

    fn open_session(lines: Vec<CartLine>) -> CartSession {
        CartSession {
            cart_id: Some(CartId::new(uuid::Uuid::new_v4())),
            status: SessionStatus::Open,
            lines,
        }
    }

    #[test]
    fn test_promotion_never_discounts_gift_cards() {
        let f = fixture();
        let session = open_session(vec![regular_line(10_000, 2), gift_line(50_000)]);

        // A discount far larger than the catalog subtotal.
        let breakdown = f
            .orchestrator
            .compute_final_total(&session, Some(&coupon(1_000_000)));

        assert_eq!(breakdown.subtotal.amount_minor, 20_000);
        assert_eq!(breakdown.discount.amount_minor, 20_000);
        assert_eq!(breakdown.gift_card_total.amount_minor, 50_000);
        assert_eq!(breakdown.paid_amount.amount_minor, 50_000);
    }

    #[test]
    fn test_partial_discount_applies_to_catalog_only() {
        let f = fixture();
        let session = open_session(vec![regular_line(10_000, 2), gift_line(50_000)]);

        let breakdown = f
            .orchestrator
            .compute_final_total(&session, Some(&coupon(5_000)));

        assert_eq!(breakdown.discount.amount_minor, 5_000);
        assert_eq!(breakdown.paid_amount.amount_minor, 65_000);
    }

    #[test]
    fn test_paid_amount_saturates_instead_of_dropping_gift_cards() {
        let f = fixture();
        let session = open_session(vec![regular_line(i64::MAX - 1, 1), gift_line(50_000)]);

        let breakdown = f.orchestrator.compute_final_total(&session, None);

        // Overflow must never understate the charge.
        assert_eq!(breakdown.paid_amount.amount_minor, i64::MAX);
    }

    #[tokio::test]
    async fn test_non_positive_total_makes_no_network_call() {
        let f = fixture();
        // Empty cart: paid amount is zero.
        let session = open_session(vec![]);

        let result = f
            .orchestrator
            .create_checkout_link(&session, ProviderCode::Cobre, None)
            .await;

        assert!(matches!(result, Err(AppError::NonPositiveAmount(_))));
        // A discount driving the total negative is clamped to zero and
        // still rejected before the gateway is touched.
        let session = open_session(vec![regular_line(500, 1)]);
        let result = f
            .orchestrator
            .create_checkout_link(&session, ProviderCode::Cobre, Some(&coupon(10_000)))
            .await;
        assert!(matches!(result, Err(AppError::NonPositiveAmount(_))));

        assert_eq!(f.gateway.create_checkout_calls(), 0);
        assert!(f.storage.durable.get(keys::PENDING_CART_ID).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_persisted_before_the_gateway_is_called() {
        let f = fixture();
        // The gateway fails; the pending keys must have been written
        // first and rolled back after.
        f.gateway.fail_create_checkout(true);
        f.gateway.observe_storage(f.storage.clone());
        let session = open_session(vec![regular_line(10_000, 1), gift_line(5_000)]);

        let result = f
            .orchestrator
            .create_checkout_link(&session, ProviderCode::Cobre, None)
            .await;

        assert!(matches!(result, Err(AppError::Gateway(_))));
        assert!(f.gateway.pending_keys_were_set_at_call_time());
        assert!(f.storage.durable.get(keys::PENDING_CART_ID).unwrap().is_none());
        assert!(f.storage.durable.get(keys::PENDING_BREAKDOWN).unwrap().is_none());
        assert!(f.storage.ephemeral.get(keys::CART_SNAPSHOT).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_successful_checkout_persists_snapshot_without_gift_cards() {
        let f = fixture();
        let session = open_session(vec![regular_line(10_000, 2), gift_line(50_000)]);

        let url = f
            .orchestrator
            .create_checkout_link(&session, ProviderCode::Wompi, None)
            .await
            .unwrap();

        assert_eq!(f.opener.opened(), vec![url]);
        let snapshot: Vec<CartLineSnapshot> =
            StorageTiers::get_json(f.storage.ephemeral.as_ref(), keys::CART_SNAPSHOT)
                .unwrap()
                .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].quantity, 2);

        let breakdown: Breakdown =
            StorageTiers::get_json(f.storage.durable.as_ref(), keys::PENDING_BREAKDOWN)
                .unwrap()
                .unwrap();
        assert_eq!(breakdown.paid_amount.amount_minor, 70_000);

        let stored: PendingCheckout =
            StorageTiers::get_json(f.storage.durable.as_ref(), keys::PENDING_CART_ID)
                .unwrap()
                .unwrap();
        assert_eq!(Some(stored.cart_id), session.cart_id);
    }

    #[tokio::test]
    async fn test_blocked_opener_rolls_back_pending_keys() {
        let f = fixture();
        f.opener.block(true);
        let session = open_session(vec![regular_line(10_000, 1)]);

        let result = f
            .orchestrator
            .create_checkout_link(&session, ProviderCode::Cobre, None)
            .await;

        assert!(matches!(
            result,
            Err(AppError::Gateway(crate::gateway::GatewayError::OpenBlocked))
        ));
        // The attempt never started.
        assert!(f.storage.durable.get(keys::PENDING_CART_ID).unwrap().is_none());
        assert!(f.storage.ephemeral.get(keys::CART_SNAPSHOT).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_promo_uses_catalog_subtotal() {
        let backend = FakeBackend::new();
        backend.insert_promo("SAVE5K", 5_000);
        let orchestrator = CheckoutOrchestrator::new(
            backend,
            FakeGateway::new(),
            Arc::new(FakeOpener::new()),
            StorageTiers::in_memory(),
            Url::parse("https://shop.example/payment/pending").unwrap(),
            CurrencyCode::COP,
        );
        let session = open_session(vec![regular_line(10_000, 2), gift_line(50_000)]);

        let promotion = orchestrator
            .validate_promo(&session, "SAVE5K")
            .await
            .unwrap();
        assert_eq!(promotion.discount_amount.amount_minor, 5_000);
        assert_eq!(promotion.new_total.amount_minor, 15_000);

        let result = orchestrator.validate_promo(&session, "NOPE").await;
        assert!(matches!(
            result,
            Err(AppError::Api(crate::api::ApiError::InvalidPromoCode(_)))
        ));
    }

    #[tokio::test]
    async fn test_checkout_without_cart_id_is_rejected() {
        let f = fixture();
        let session = CartSession {
            cart_id: None,
            status: SessionStatus::None,
            lines: vec![regular_line(10_000, 1)],
        };

        let result = f
            .orchestrator
            .create_checkout_link(&session, ProviderCode::Cobre, None)
            .await;
        assert!(matches!(result, Err(AppError::MissingCart)));
        assert_eq!(f.gateway.create_checkout_calls(), 0);
    }
}
