//! Type-safe price representation in minor currency units.
//!
//! The backend cart service quotes `unitPriceMinor` as a string of minor
//! units (Colombian pesos have no subdivision in practice, but the wire
//! format is minor units throughout). Arithmetic is checked: totals are
//! computed over untrusted quantities, and overflow must surface as an
//! error, never wrap.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information, held in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the smallest currency unit.
    pub amount_minor: i64,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price from minor units.
    #[must_use]
    pub const fn from_minor(amount_minor: i64, currency_code: CurrencyCode) -> Self {
        Self {
            amount_minor,
            currency_code,
        }
    }

    /// A zero price in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::from_minor(0, currency_code)
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.amount_minor > 0
    }

    /// Checked addition; `None` if currencies differ or the sum overflows.
    #[must_use]
    pub fn checked_add(&self, other: Self) -> Option<Self> {
        if self.currency_code != other.currency_code {
            return None;
        }
        self.amount_minor
            .checked_add(other.amount_minor)
            .map(|sum| Self::from_minor(sum, self.currency_code))
    }

    /// Checked multiplication by a quantity.
    #[must_use]
    pub fn checked_mul(&self, quantity: u32) -> Option<Self> {
        self.amount_minor
            .checked_mul(i64::from(quantity))
            .map(|total| Self::from_minor(total, self.currency_code))
    }

    /// Addition saturating at `i64::MAX`.
    ///
    /// Returns `self` unchanged when currencies differ.
    #[must_use]
    pub fn saturating_add(&self, other: Self) -> Self {
        if self.currency_code != other.currency_code {
            return *self;
        }
        Self::from_minor(
            self.amount_minor.saturating_add(other.amount_minor),
            self.currency_code,
        )
    }

    /// Subtraction clamped at zero, for applying discounts.
    ///
    /// Returns `self` unchanged when currencies differ; a discount in the
    /// wrong currency must never reduce a total.
    #[must_use]
    pub fn saturating_sub(&self, other: Self) -> Self {
        if self.currency_code != other.currency_code {
            return *self;
        }
        Self::from_minor(
            self.amount_minor.saturating_sub(other.amount_minor).max(0),
            self.currency_code,
        )
    }

    /// The amount in the currency's standard unit, for display.
    #[must_use]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.amount_minor, self.currency_code.minor_unit_scale())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    COP,
    USD,
    EUR,
}

impl CurrencyCode {
    /// Decimal places between the minor unit and the display unit.
    #[must_use]
    pub const fn minor_unit_scale(self) -> u32 {
        match self {
            // COP is quoted without subdivision
            Self::COP => 0,
            Self::USD | Self::EUR => 2,
        }
    }

    /// The ISO 4217 code as a string.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::COP => "COP",
            Self::USD => "USD",
            Self::EUR => "EUR",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
