//! Core types for Hilo.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod line;
pub mod price;
pub mod status;

pub use id::*;
pub use line::{Breakdown, CartLine, CartLineSnapshot, PromotionState};
pub use price::{CurrencyCode, Price};
pub use status::*;
