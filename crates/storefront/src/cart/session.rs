//! The in-memory cart view.

use serde::{Deserialize, Serialize};

use hilo_core::{CartId, CartLine, CurrencyCode, LineId, Price, SessionStatus};

/// The cart as the buyer currently sees it.
///
/// Owned exclusively by [`super::CartEngine`]; views read it, only the
/// engine writes it. `cart_id` is non-null only while a server-side cart
/// exists in the `open` status. Gift-card lines may exist with
/// `cart_id = None` - the backend cart model has no gift-card concept, so
/// those lines live purely on this side until checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartSession {
    pub cart_id: Option<CartId>,
    pub status: SessionStatus,
    pub lines: Vec<CartLine>,
}

impl CartSession {
    /// A fresh session with no cart and no lines.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Catalog (non-gift-card) lines.
    pub fn regular_lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter().filter(|line| !line.is_gift_card)
    }

    /// Gift-card lines.
    pub fn gift_card_lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter().filter(|line| line.is_gift_card)
    }

    #[must_use]
    pub fn has_gift_card_lines(&self) -> bool {
        self.lines.iter().any(|line| line.is_gift_card)
    }

    #[must_use]
    pub fn find_line(&self, line_id: &LineId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.id == line_id)
    }

    /// Subtotal over catalog lines. Lines in a foreign currency do not
    /// contribute.
    #[must_use]
    pub fn regular_subtotal(&self, currency: CurrencyCode) -> Price {
        subtotal(self.regular_lines(), currency)
    }

    /// Subtotal over gift-card lines.
    #[must_use]
    pub fn gift_card_subtotal(&self, currency: CurrencyCode) -> Price {
        subtotal(self.gift_card_lines(), currency)
    }
}

fn subtotal<'a>(lines: impl Iterator<Item = &'a CartLine>, currency: CurrencyCode) -> Price {
    lines.fold(Price::zero(currency), |acc, line| {
        acc.checked_add(line.line_total()).unwrap_or(acc)
    })
}
