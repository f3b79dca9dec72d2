//! Cart line, snapshot, and promotion value types.

use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, LineId, Price, ProductId, PromoKind, VariantId};

/// A single line of the in-memory cart session.
///
/// Regular lines reference a catalog product. Gift-card lines are a client
/// side-channel: the backend cart schema has no gift-card concept, so they
/// only ever live in the session (and the ephemeral storage tier) until
/// payment confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: LineId,
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    /// Always >= 1; a quantity of zero means the line must be removed.
    pub quantity: u32,
    pub unit_price: Price,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_gift_card: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gift_card_amount: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gift_message: Option<String>,
}

impl CartLine {
    /// The line total (`unit_price * quantity`), saturating on overflow.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.checked_mul(self.quantity).unwrap_or(Price::from_minor(
            i64::MAX,
            self.unit_price.currency_code,
        ))
    }
}

/// A price-and-quantity-frozen copy of a non-gift-card line, taken when a
/// checkout link is requested.
///
/// The live cart may mutate while payment is in flight; the snapshot is what
/// gets forwarded to the reconciliation endpoint after the gateway reports a
/// terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineSnapshot {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub unit_price: Price,
    pub display_name: String,
}

impl From<&CartLine> for CartLineSnapshot {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id,
            variant_id: line.variant_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            display_name: line.display_name.clone(),
        }
    }
}

/// A validated promotion code and its effect on the payable total.
///
/// At most one promotion is active per cart session. The discount applies
/// only to the non-gift-card subtotal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionState {
    pub code: String,
    pub kind: PromoKind,
    pub discount_amount: Price,
    pub new_total: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_balance: Option<Price>,
}

/// The payable-total breakdown frozen alongside the snapshot at checkout
/// time and forwarded on payment reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub subtotal: Price,
    pub discount: Price,
    pub gift_card_total: Price,
    pub paid_amount: Price,
}

impl Breakdown {
    /// A breakdown with every component at zero.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self {
            subtotal: Price::zero(currency),
            discount: Price::zero(currency),
            gift_card_total: Price::zero(currency),
            paid_amount: Price::zero(currency),
        }
    }
}
