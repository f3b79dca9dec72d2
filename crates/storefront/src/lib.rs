//! Hilo Storefront - cart reconciliation, checkout, and payment tracking.
//!
//! This library owns the client-side cart state for the Hilo artisan
//! marketplace and keeps it consistent across three lifetimes:
//!
//! - a durable per-client store for an anonymous visitor's cart lines,
//! - an ephemeral per-session store for gift-card lines (the backend cart
//!   schema has no gift-card concept),
//! - the authoritative server-side cart owned by the backend cart service.
//!
//! On top of that it computes the payable total, requests a checkout link
//! from the payment gateway, and tracks the asynchronously-arriving payment
//! outcome to a terminal state, firing post-payment reconciliation exactly
//! once no matter how often the status signal is delivered.
//!
//! # Architecture
//!
//! - [`cart::CartEngine`] - single source of truth for the cart session;
//!   every mutation goes through it and is routed to the store that owns
//!   the line (guest/gift-card lines locally, everything else server-side).
//! - [`checkout::CheckoutOrchestrator`] - turns a session into a payment
//!   redirect, freezing a snapshot of the cart for later reconciliation.
//! - [`payment::ConfirmationTracker`] - observes the gateway's status
//!   signal and drives the one-shot post-payment side effect.
//! - [`api::CartApiClient`] / [`gateway::GatewayClient`] - reqwest clients
//!   for the two external collaborators, behind traits so the engine can be
//!   tested against in-memory fakes.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod payment;
pub mod storage;

#[cfg(test)]
pub(crate) mod testutil;

pub use cart::{CartEngine, CartSession};
pub use checkout::CheckoutOrchestrator;
pub use config::StorefrontConfig;
pub use error::{AppError, Result};
pub use payment::ConfirmationTracker;
