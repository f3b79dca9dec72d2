//! The reconciliation engine proper.

use tracing::instrument;

use hilo_core::{
    BuyerId, CartId, CartLine, CartStatus, CurrencyCode, LineId, Price, ProductId, SessionStatus,
    VariantId,
};

use crate::api::{AddCartItemRequest, CartBackend, SyncGuestCartItem, SyncGuestCartRequest};
use crate::error::{AppError, Result};
use crate::storage::{StorageTiers, keys};

use super::CartSession;

/// Single source of truth for the buyer's cart.
///
/// Mutations take `&mut self`, which serializes them per session: each
/// mutate-then-refetch cycle completes before the next one is applied.
/// After any authenticated mutation the engine re-fetches the
/// authoritative item list rather than trusting its own optimistic state,
/// since price and id assignment happen server-side.
#[derive(Debug)]
pub struct CartEngine<B> {
    backend: B,
    storage: StorageTiers,
    currency: CurrencyCode,
    buyer_id: Option<BuyerId>,
    session: CartSession,
}

impl<B: CartBackend> CartEngine<B> {
    pub fn new(backend: B, storage: StorageTiers, currency: CurrencyCode) -> Self {
        Self {
            backend,
            storage,
            currency,
            buyer_id: None,
            session: CartSession::empty(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &CartSession {
        &self.session
    }

    #[must_use]
    pub const fn buyer_id(&self) -> Option<BuyerId> {
        self.buyer_id
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.buyer_id.is_some()
    }

    /// Currency the session's subtotals are computed in.
    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    // =========================================================================
    // Hydration and the merge protocol
    // =========================================================================

    /// Populate the session for the given identity.
    ///
    /// Guests hydrate from the durable store verbatim. An authenticated
    /// identity with pending guest or gift-card lines triggers the merge
    /// protocol; otherwise the open cart is fetched from the backend.
    #[instrument(skip(self), fields(buyer_id = ?identity))]
    pub async fn load_for_identity(&mut self, identity: Option<BuyerId>) -> Result<()> {
        self.buyer_id = identity;
        match identity {
            None => {
                let lines = self.stored_guest_lines()?;
                self.session = CartSession {
                    cart_id: None,
                    status: SessionStatus::None,
                    lines,
                };
                Ok(())
            }
            Some(buyer) => {
                let has_pending = !self.stored_guest_lines()?.is_empty()
                    || self.session.has_gift_card_lines();
                if has_pending {
                    self.merge_guest_cart(buyer).await
                } else {
                    self.fetch_open_cart(buyer, false).await
                }
            }
        }
    }

    /// Re-fetch the authoritative view without mutating anything.
    ///
    /// `preserve_cart_id` keeps the cart id through a "no active cart"
    /// answer, and only takes effect while gift-card lines exist; a
    /// concurrent gift-card-only checkout still needs that id.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self, preserve_cart_id: bool) -> Result<()> {
        match self.buyer_id {
            Some(buyer) => self.fetch_open_cart(buyer, preserve_cart_id).await,
            None => {
                self.session.lines = self.stored_guest_lines()?;
                Ok(())
            }
        }
    }

    /// Guest-to-authenticated merge.
    ///
    /// Regular guest lines are handed to the backend's bulk sync (an
    /// empty list is legal and still materializes a cart record, which a
    /// gift-card-only checkout needs). On failure the durable store is
    /// left untouched so nothing is lost; on success it is cleared, the
    /// authoritative list is re-fetched, and gift-card lines are
    /// recombined into it. The cart id is restored explicitly after
    /// recombination: a re-fetch that finds zero server rows must not
    /// null it out.
    async fn merge_guest_cart(&mut self, buyer: BuyerId) -> Result<()> {
        let guest_lines = self.stored_guest_lines()?;
        let gift = self.collect_gift_lines(&guest_lines)?;
        let regular: Vec<CartLine> = guest_lines
            .iter()
            .filter(|line| !line.is_gift_card)
            .cloned()
            .collect();

        let mut cart_id = self.session.cart_id;
        if !regular.is_empty() || (cart_id.is_none() && !gift.is_empty()) {
            let request = SyncGuestCartRequest {
                buyer_user_id: buyer,
                items: regular.iter().map(SyncGuestCartItem::from).collect(),
            };
            let synced = self
                .backend
                .sync_guest_cart(&request)
                .await
                .map_err(AppError::GuestCartSync)?;
            cart_id = Some(synced);
        }

        // Guest lines are server-owned from here on.
        self.storage.durable.remove(keys::GUEST_CART)?;

        let authoritative = match cart_id {
            Some(id) => self.backend.get_cart_items(id).await?,
            None => Vec::new(),
        };

        self.session.lines = recombine(authoritative, gift);
        self.session.cart_id = cart_id;
        self.session.status = if cart_id.is_some() {
            SessionStatus::Open
        } else {
            SessionStatus::None
        };
        self.persist_gift_lines()
    }

    async fn fetch_open_cart(&mut self, buyer: BuyerId, preserve_cart_id: bool) -> Result<()> {
        let gift = self.pending_gift_lines()?;
        match self.backend.get_open_cart(buyer).await {
            Ok(summary) if summary.status.is_open() => {
                let lines = self.backend.get_cart_items(summary.id).await?;
                self.session.lines = recombine(lines, gift);
                self.session.cart_id = Some(summary.id);
                self.session.status = SessionStatus::Open;
            }
            Ok(summary) => {
                self.enter_no_active_cart(gift, preserve_cart_id);
                self.session.status = match summary.status {
                    CartStatus::Converted => SessionStatus::Converted,
                    _ => SessionStatus::Other,
                };
            }
            Err(e) if e.is_not_found() => {
                self.enter_no_active_cart(gift, preserve_cart_id);
                self.session.status = SessionStatus::None;
            }
            Err(e) => return Err(e.into()),
        }
        self.persist_gift_lines()
    }

    /// "No active cart" keeps only gift-card lines; the cart id survives
    /// iff gift-card lines exist and the caller asked for preservation.
    fn enter_no_active_cart(&mut self, gift: Vec<CartLine>, preserve_cart_id: bool) {
        let keep_id = preserve_cart_id && !gift.is_empty();
        self.session.lines = gift;
        if !keep_id {
            self.session.cart_id = None;
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a catalog product to the cart.
    ///
    /// Guests get a locally-minted line (duplicate product+variant pairs
    /// are summed, matching the backend's add-item contract).
    /// Authenticated sessions delegate to the backend; with no cart yet,
    /// the bulk sync operation creates one seeded with this item.
    #[instrument(skip(self), fields(product_id = %product_id, quantity))]
    pub async fn add_line(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        variant_id: Option<VariantId>,
    ) -> Result<()> {
        // Lines never carry a zero quantity; there is nothing to add.
        if quantity == 0 {
            return Ok(());
        }
        let product = self.backend.get_product(product_id).await?;

        match self.buyer_id {
            None => {
                if let Some(line) = self.session.lines.iter_mut().find(|line| {
                    !line.is_gift_card
                        && line.product_id == product_id
                        && line.variant_id == variant_id
                }) {
                    line.quantity = line.quantity.saturating_add(quantity);
                } else {
                    self.session.lines.push(CartLine {
                        id: LineId::mint_local(),
                        product_id,
                        variant_id,
                        quantity,
                        unit_price: product.unit_price,
                        display_name: product.name,
                        image_url: product.image_url,
                        is_gift_card: false,
                        gift_card_amount: None,
                        recipient_email: None,
                        gift_message: None,
                    });
                }
                self.persist_guest_lines()
            }
            Some(buyer) => {
                let cart_id = if let Some(cart_id) = self.session.cart_id {
                    let request =
                        AddCartItemRequest::from_product(cart_id, &product, quantity, variant_id);
                    self.backend.add_cart_item(&request).await?;
                    cart_id
                } else {
                    let request = SyncGuestCartRequest {
                        buyer_user_id: buyer,
                        items: vec![SyncGuestCartItem {
                            product_id,
                            variant_id,
                            quantity,
                        }],
                    };
                    self.backend
                        .sync_guest_cart(&request)
                        .await
                        .map_err(AppError::GuestCartSync)?
                };
                self.refetch_items(cart_id).await
            }
        }
    }

    /// Add a gift-card line.
    ///
    /// The backend cart model cannot represent these, so the line lives
    /// on this side (ephemeral tier, plus the durable guest cart for
    /// guests) until checkout forwards its amount.
    #[instrument(skip(self, recipient_email, gift_message), fields(amount = amount.amount_minor))]
    pub fn add_gift_card(
        &mut self,
        amount: Price,
        recipient_email: Option<String>,
        gift_message: Option<String>,
    ) -> Result<LineId> {
        let id = LineId::mint_gift_card();
        self.session.lines.push(CartLine {
            id: id.clone(),
            product_id: ProductId::new(uuid::Uuid::new_v4()),
            variant_id: None,
            quantity: 1,
            unit_price: amount,
            display_name: "Gift card".to_string(),
            image_url: None,
            is_gift_card: true,
            gift_card_amount: Some(amount),
            recipient_email,
            gift_message,
        });
        if self.buyer_id.is_none() {
            self.persist_guest_lines()?;
        }
        self.persist_gift_lines()?;
        Ok(id)
    }

    /// Remove a line. Local and gift-card lines are removed in memory and
    /// in the stores; server lines go through the backend delete followed
    /// by a re-fetch.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn remove_line(&mut self, line_id: &LineId) -> Result<()> {
        if let Some(item_id) = line_id.as_item_id() {
            let cart_id = self.session.cart_id.ok_or(AppError::MissingCart)?;
            self.backend.delete_cart_item(item_id).await?;
            self.refetch_items(cart_id).await
        } else {
            let before = self.session.lines.len();
            self.session.lines.retain(|line| &line.id != line_id);
            if self.session.lines.len() == before {
                return Err(AppError::UnknownLine(line_id.to_string()));
            }
            self.persist_local()
        }
    }

    /// Change a line's quantity. Zero means remove, never retain.
    #[instrument(skip(self), fields(line_id = %line_id, quantity))]
    pub async fn set_quantity(&mut self, line_id: &LineId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return self.remove_line(line_id).await;
        }
        if let Some(item_id) = line_id.as_item_id() {
            let cart_id = self.session.cart_id.ok_or(AppError::MissingCart)?;
            self.backend.update_cart_item(item_id, quantity).await?;
            self.refetch_items(cart_id).await
        } else {
            let line = self
                .session
                .lines
                .iter_mut()
                .find(|line| &line.id == line_id)
                .ok_or_else(|| AppError::UnknownLine(line_id.to_string()))?;
            line.quantity = quantity;
            self.persist_local()
        }
    }

    /// Clear the session and both storage tiers.
    ///
    /// Used only after a terminal payment outcome or an explicit abandon.
    #[instrument(skip(self))]
    pub fn reset_session(&mut self) -> Result<()> {
        self.session = CartSession::empty();
        self.storage.clear_all()?;
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn refetch_items(&mut self, cart_id: CartId) -> Result<()> {
        let gift = self.pending_gift_lines()?;
        let lines = self.backend.get_cart_items(cart_id).await?;
        self.session.lines = recombine(lines, gift);
        self.session.cart_id = Some(cart_id);
        self.session.status = SessionStatus::Open;
        self.persist_gift_lines()
    }

    fn stored_guest_lines(&self) -> Result<Vec<CartLine>> {
        Ok(
            StorageTiers::get_json(self.storage.durable.as_ref(), keys::GUEST_CART)?
                .unwrap_or_default(),
        )
    }

    /// Gift-card lines from the session and the ephemeral mirror,
    /// de-duplicated by id with the in-memory copy winning.
    fn pending_gift_lines(&self) -> Result<Vec<CartLine>> {
        self.collect_gift_lines(&[])
    }

    /// Gift-card lines across all sources, newest copy first: in-memory
    /// session, then the ephemeral mirror, then durable guest lines.
    fn collect_gift_lines(&self, stored_guest: &[CartLine]) -> Result<Vec<CartLine>> {
        let mut gift: Vec<CartLine> = self.session.gift_card_lines().cloned().collect();

        let mirrored: Vec<CartLine> =
            StorageTiers::get_json(self.storage.ephemeral.as_ref(), keys::GIFT_CARD_LINES)?
                .unwrap_or_default();
        for line in mirrored {
            if !gift.iter().any(|existing| existing.id == line.id) {
                gift.push(line);
            }
        }
        for line in stored_guest.iter().filter(|line| line.is_gift_card) {
            if !gift.iter().any(|existing| existing.id == line.id) {
                gift.push(line.clone());
            }
        }
        Ok(gift)
    }

    fn persist_guest_lines(&self) -> Result<()> {
        StorageTiers::set_json(self.storage.durable.as_ref(), keys::GUEST_CART, &self.session.lines)?;
        Ok(())
    }

    fn persist_gift_lines(&self) -> Result<()> {
        let gift: Vec<&CartLine> = self.session.gift_card_lines().collect();
        StorageTiers::set_json(self.storage.ephemeral.as_ref(), keys::GIFT_CARD_LINES, &gift)?;
        Ok(())
    }

    fn persist_local(&self) -> Result<()> {
        if self.buyer_id.is_none() {
            self.persist_guest_lines()?;
        }
        self.persist_gift_lines()
    }
}

/// Authoritative regular lines plus gift-card lines. The gift set is
/// already de-duplicated; the server list can never contain gift cards.
fn recombine(mut regular: Vec<CartLine>, gift: Vec<CartLine>) -> Vec<CartLine> {
    regular.extend(gift);
    regular
}
