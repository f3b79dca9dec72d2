//! Client-side storage tiers.
//!
//! The engine keeps buyer state in two key-value tiers with different
//! lifetimes:
//!
//! - **Durable** ([`FileStore`]): survives restarts. Holds the guest cart
//!   and the pending-payment keys that must outlive a redirect to the
//!   payment provider.
//! - **Ephemeral** ([`MemoryStore`]): lives for the process. Holds the
//!   gift-card line mirror and the pre-checkout cart snapshot.
//!
//! All values are stored as JSON strings; the typed accessors on
//! [`StorageTiers`] handle (de)serialization. A value that fails to
//! deserialize is treated as absent rather than an error, so a stale or
//! hand-edited file can never wedge the engine.

mod file;
mod memory;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

// =============================================================================
// Keys
// =============================================================================

/// Well-known storage keys.
pub mod keys {
    /// Durable: serialized guest cart lines (regular and gift-card).
    pub const GUEST_CART: &str = "guest_cart";
    /// Ephemeral: gift-card lines mirrored for the current session.
    pub const GIFT_CARD_LINES: &str = "gift_card_lines";
    /// Durable: cart id awaiting payment confirmation.
    pub const PENDING_CART_ID: &str = "pending_payment_cart_id";
    /// Durable: amount breakdown captured at checkout time.
    pub const PENDING_BREAKDOWN: &str = "pending_payment_breakdown";
    /// Ephemeral: cart line snapshot captured before redirecting to pay.
    pub const CART_SNAPSHOT: &str = "cart_items_snapshot";
}

// =============================================================================
// Errors
// =============================================================================

/// Storage tier error type.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Store trait
// =============================================================================

/// A flat string key-value store.
///
/// Implementations must be safe to share across tasks. All three
/// operations are total: `get` of an absent key yields `Ok(None)` and
/// `remove` of an absent key is a no-op.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value for `key`, if present.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key` if present.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// Tiers
// =============================================================================

/// The two client storage tiers used by the engine.
#[derive(Clone)]
pub struct StorageTiers {
    /// Survives restarts.
    pub durable: Arc<dyn KeyValueStore>,
    /// Lives for the process.
    pub ephemeral: Arc<dyn KeyValueStore>,
}

impl StorageTiers {
    /// Build tiers from concrete stores.
    pub fn new(durable: Arc<dyn KeyValueStore>, ephemeral: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, ephemeral }
    }

    /// Fully in-memory tiers, used in tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            durable: Arc::new(MemoryStore::new()),
            ephemeral: Arc::new(MemoryStore::new()),
        }
    }

    /// Read and deserialize a JSON value from a store.
    ///
    /// A value that is present but malformed is treated as absent; a
    /// corrupt persisted entry must never block the engine.
    pub fn get_json<T: DeserializeOwned>(
        store: &dyn KeyValueStore,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        let Some(raw) = store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding malformed stored value");
                Ok(None)
            }
        }
    }

    /// Serialize and write a JSON value to a store.
    pub fn set_json<T: Serialize>(
        store: &dyn KeyValueStore,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        store.set(key, &raw)
    }

    /// Remove every key written during checkout preparation.
    ///
    /// Used both when a payment reaches a terminal state and when the
    /// buyer abandons a pending payment.
    pub fn clear_checkout_state(&self) -> Result<(), StorageError> {
        self.durable.remove(keys::PENDING_CART_ID)?;
        self.durable.remove(keys::PENDING_BREAKDOWN)?;
        self.ephemeral.remove(keys::CART_SNAPSHOT)?;
        Ok(())
    }

    /// Remove every key the engine owns, in both tiers.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        self.clear_checkout_state()?;
        self.durable.remove(keys::GUEST_CART)?;
        self.ephemeral.remove(keys::GIFT_CARD_LINES)?;
        Ok(())
    }
}

impl std::fmt::Debug for StorageTiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageTiers").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_value_reads_as_absent() {
        let tiers = StorageTiers::in_memory();
        tiers
            .durable
            .set(keys::GUEST_CART, "not json at all")
            .unwrap();

        let read: Option<Vec<String>> =
            StorageTiers::get_json(tiers.durable.as_ref(), keys::GUEST_CART).unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let tiers = StorageTiers::in_memory();
        StorageTiers::set_json(
            tiers.ephemeral.as_ref(),
            keys::CART_SNAPSHOT,
            &vec!["a".to_string(), "b".to_string()],
        )
        .unwrap();

        let read: Option<Vec<String>> =
            StorageTiers::get_json(tiers.ephemeral.as_ref(), keys::CART_SNAPSHOT).unwrap();
        assert_eq!(read, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_clear_checkout_state_leaves_guest_cart() {
        let tiers = StorageTiers::in_memory();
        tiers.durable.set(keys::GUEST_CART, "[]").unwrap();
        tiers.durable.set(keys::PENDING_CART_ID, "\"x\"").unwrap();
        tiers.durable.set(keys::PENDING_BREAKDOWN, "{}").unwrap();
        tiers.ephemeral.set(keys::CART_SNAPSHOT, "[]").unwrap();

        tiers.clear_checkout_state().unwrap();

        assert!(tiers.durable.get(keys::GUEST_CART).unwrap().is_some());
        assert!(tiers.durable.get(keys::PENDING_CART_ID).unwrap().is_none());
        assert!(tiers.durable.get(keys::PENDING_BREAKDOWN).unwrap().is_none());
        assert!(tiers.ephemeral.get(keys::CART_SNAPSHOT).unwrap().is_none());
    }

    #[test]
    fn test_clear_all_empties_both_tiers() {
        let tiers = StorageTiers::in_memory();
        tiers.durable.set(keys::GUEST_CART, "[]").unwrap();
        tiers.ephemeral.set(keys::GIFT_CARD_LINES, "[]").unwrap();

        tiers.clear_all().unwrap();

        assert!(tiers.durable.get(keys::GUEST_CART).unwrap().is_none());
        assert!(
            tiers
                .ephemeral
                .get(keys::GIFT_CARD_LINES)
                .unwrap()
                .is_none()
        );
    }
}
