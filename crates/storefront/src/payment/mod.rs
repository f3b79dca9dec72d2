//! Payment confirmation tracking.
//!
//! After the buyer is redirected to the payment provider the outcome
//! arrives asynchronously and possibly more than once. The tracker drives
//! the attempt to a terminal state and fires the post-payment
//! reconciliation side effect exactly once, guarded by a boolean latch
//! that is set *before* the asynchronous call begins, so a duplicate
//! `completed` delivery can never double-apply.
//!
//! The reconciliation call itself is best-effort: the server-side webhook
//! is the authoritative order-materialization path, so a failed sync is
//! logged and the session reset proceeds regardless.

use tracing::instrument;

use hilo_core::{Breakdown, CartId, CartLineSnapshot, PaymentStatus};

use crate::api::{CartBackend, SyncPaymentStatusRequest};
use crate::cart::CartEngine;
use crate::checkout::PendingCheckout;
use crate::error::Result;
use crate::gateway::StatusSubscription;
use crate::storage::{StorageTiers, keys};

/// State recovered from storage when entering the pending-payment view.
#[derive(Debug, Clone)]
pub struct PendingPayment {
    pub cart_id: CartId,
    pub snapshot: Option<Vec<CartLineSnapshot>>,
    pub breakdown: Option<Breakdown>,
}

/// Drives one payment attempt to a terminal state.
pub struct ConfirmationTracker<B> {
    backend: B,
    storage: StorageTiers,
    pending: Option<PendingPayment>,
    status: PaymentStatus,
    /// One-shot latch for the reconciliation side effect.
    synced: bool,
}

impl<B: CartBackend> ConfirmationTracker<B> {
    /// Recover the pending attempt from storage.
    ///
    /// A missing pending cart id means there is nothing to reconcile;
    /// malformed snapshot or breakdown values degrade to "nothing
    /// forwarded" rather than blocking confirmation.
    pub fn load(backend: B, storage: StorageTiers) -> Result<Self> {
        let checkout: Option<PendingCheckout> =
            StorageTiers::get_json(storage.durable.as_ref(), keys::PENDING_CART_ID)?;
        let pending = match checkout {
            Some(checkout) => Some(PendingPayment {
                cart_id: checkout.cart_id,
                snapshot: StorageTiers::get_json(
                    storage.ephemeral.as_ref(),
                    keys::CART_SNAPSHOT,
                )?,
                breakdown: StorageTiers::get_json(
                    storage.durable.as_ref(),
                    keys::PENDING_BREAKDOWN,
                )?,
            }),
            None => None,
        };

        Ok(Self {
            backend,
            storage,
            pending,
            status: PaymentStatus::Initiated,
            synced: false,
        })
    }

    #[must_use]
    pub const fn status(&self) -> PaymentStatus {
        self.status
    }

    #[must_use]
    pub const fn pending(&self) -> Option<&PendingPayment> {
        self.pending.as_ref()
    }

    /// Apply one observed status.
    ///
    /// The first `Completed` fires the guarded reconciliation call, then
    /// clears the checkout keys and resets the engine session. Every
    /// later delivery of `Completed` is a no-op.
    #[instrument(skip(self, engine), fields(status = status.as_str()))]
    pub async fn observe<E: CartBackend>(
        &mut self,
        status: PaymentStatus,
        engine: &mut CartEngine<E>,
    ) -> Result<()> {
        self.status = status;
        if status != PaymentStatus::Completed || self.synced {
            return Ok(());
        }

        // Latch before the call begins: a second `completed` observed
        // while this await is in flight must not re-enter.
        self.synced = true;

        if let Some(pending) = &self.pending {
            let request = SyncPaymentStatusRequest {
                cart_id: pending.cart_id,
                payment_status: status,
                cart_items: pending.snapshot.clone(),
                breakdown: pending.breakdown.clone(),
            };
            if let Err(e) = self.backend.sync_payment_status(&request).await {
                // Best effort; the server webhook already materialized
                // the order.
                tracing::warn!(cart_id = %pending.cart_id, error = %e, "Payment status sync failed");
            }
        }

        self.storage.clear_checkout_state()?;
        engine.reset_session()?;
        Ok(())
    }

    /// Observe statuses from a subscription until a terminal one arrives.
    ///
    /// Stops the subscription before returning so no late status can
    /// fire after the view is gone.
    pub async fn run<E: CartBackend>(
        &mut self,
        subscription: &mut StatusSubscription,
        engine: &mut CartEngine<E>,
    ) -> Result<PaymentStatus> {
        while let Some(status) = subscription.next_status().await {
            self.observe(status, engine).await?;
            if status.is_terminal() {
                break;
            }
        }
        subscription.stop();
        Ok(self.status)
    }

    /// Walk away from the attempt: clear every snapshot and
    /// pending-payment key, terminal status or not.
    #[instrument(skip(self))]
    pub fn abandon(&mut self) -> Result<()> {
        self.pending = None;
        self.storage.clear_checkout_state()?;
        Ok(())
    }
}
