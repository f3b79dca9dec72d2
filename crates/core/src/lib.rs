//! Hilo Core - Shared types library.
//!
//! This crate provides common types used across all Hilo components:
//! - `storefront` - Cart reconciliation, checkout, and payment tracking engine
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, and statuses,
//!   plus the cart line and promotion value types shared by the engine.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
