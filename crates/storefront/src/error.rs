//! Unified error handling for the storefront engine.
//!
//! The error taxonomy mirrors how failures are surfaced to the buyer:
//!
//! - *Recoverable, user-visible*: a checkout-link request failed, the bulk
//!   guest-cart sync failed, the checkout link could not be opened, a promo
//!   code was rejected. State is left unchanged and the action can be
//!   retried.
//! - *Recoverable, silent*: the post-payment reconciliation call failed.
//!   The server-side webhook is the authoritative fallback, so this is
//!   logged and never blocks the session reset (it never surfaces as an
//!   `AppError` at all - see [`crate::payment`]).
//! - *Not-found-as-signal*: the backend reporting "no open cart" is not an
//!   error; the engine maps it to an empty session.
//!
//! Nothing in this engine is fatal: even a malformed persisted snapshot
//! degrades to "no cart items forwarded".

use thiserror::Error;

use hilo_core::Price;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::storage::StorageError;

/// Application-level error type for the storefront engine.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend cart service operation failed.
    #[error("Cart service error: {0}")]
    Api(#[from] ApiError),

    /// Guest-cart bulk sync failed; the durable guest cart is untouched.
    #[error("Guest cart sync failed: {0}")]
    GuestCartSync(#[source] ApiError),

    /// Payment gateway operation failed.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Client storage tier operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration loading failed.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Checkout was requested for a non-positive total.
    ///
    /// Zero/negative totals must go through the zero-payment path; the
    /// gateway cannot issue a checkout link for them.
    #[error("Checkout amount must be positive, got {0:?}")]
    NonPositiveAmount(Price),

    /// An operation required a server cart but the session has none.
    #[error("No active cart")]
    MissingCart,

    /// A referenced cart line does not exist in the session.
    #[error("Unknown cart line: {0}")]
    UnknownLine(String),
}

impl AppError {
    /// Whether the buyer can simply retry the triggering action.
    ///
    /// Everything in this engine short of a config error is retryable;
    /// failed operations never leave partial state behind.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
