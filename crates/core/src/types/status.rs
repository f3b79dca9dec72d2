//! Status enums for carts, sessions, and payment attempts.

use serde::{Deserialize, Serialize};

/// Server-side cart lifecycle status.
///
/// Maps to the backend cart service's status values. Only `Open` carts
/// accept mutations; anything else is treated by the engine as "no active
/// cart".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    #[default]
    Open,
    Locked,
    Converted,
    Abandoned,
}

impl CartStatus {
    /// Whether the cart still accepts mutations.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Status of the client-side cart session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No server cart exists for this session.
    #[default]
    None,
    /// An open server cart backs this session.
    Open,
    /// The server cart was converted into an order.
    Converted,
    /// The server cart exists but is in some other non-open state.
    Other,
}

/// Status of a payment attempt, as reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Initiated,
    Processing,
    Completed,
    Failed,
    Canceled,
    Returned,
}

impl PaymentStatus {
    /// Whether this status ends the attempt from the tracker's perspective.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Canceled | Self::Returned
        )
    }

    /// Whether this is a terminal non-success status.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Canceled | Self::Returned)
    }

    /// The wire form sent to the reconciliation endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Returned => "returned",
        }
    }
}

/// Kind of promotion code applied at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromoKind {
    GiftCard,
    Coupon,
}

/// Payment provider selected at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderCode {
    /// PSE bank transfer.
    #[default]
    Cobre,
    /// Credit card.
    Wompi,
}

impl ProviderCode {
    /// The wire form sent to the gateway.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cobre => "cobre",
            Self::Wompi => "wompi",
        }
    }
}
