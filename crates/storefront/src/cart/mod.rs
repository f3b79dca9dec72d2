//! Cart reconciliation engine.
//!
//! Owns the in-memory cart view and every transition between guest and
//! authenticated state. All mutation goes through [`CartEngine`] methods;
//! nothing else writes the session or the storage tiers.

mod engine;
mod session;

pub use engine::CartEngine;
pub use session::CartSession;
