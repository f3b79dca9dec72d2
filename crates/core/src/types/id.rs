//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. Server-issued
//! identifiers are UUIDs; cart line identifiers are strings because a line
//! may also carry a locally-minted placeholder id (see [`LineId`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around [`Uuid`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_uuid()`
/// - `From<Uuid>` and `Into<Uuid>` implementations
///
/// # Example
///
/// ```rust
/// # use hilo_core::define_id;
/// define_id!(BuyerId);
/// define_id!(CartId);
///
/// let buyer_id = BuyerId::new(uuid::Uuid::new_v4());
/// let cart_id = CartId::new(uuid::Uuid::new_v4());
///
/// // These are different types, so this won't compile:
/// // let _: BuyerId = cart_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Create a new ID from a UUID value.
            #[must_use]
            pub const fn new(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Get the underlying UUID value.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(id: ::uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(BuyerId);
define_id!(CartId);
define_id!(ProductId);
define_id!(VariantId);
define_id!(ItemId);
define_id!(ShopId);

/// Prefix for ids minted locally for guest cart lines.
pub const LOCAL_LINE_PREFIX: &str = "local-";

/// Prefix for ids minted locally for gift-card cart lines.
pub const GIFT_CARD_LINE_PREFIX: &str = "giftcard-";

/// Identifier of a cart line.
///
/// Server-owned lines carry the backend item id. Lines that only exist on
/// the client carry a locally-minted placeholder: `local-<uuid>` for guest
/// catalog lines, `giftcard-<uuid>` for gift-card lines. The prefix decides
/// which backing store a mutation is routed to, so it is part of the type's
/// contract rather than a display concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    /// Wrap a server-issued item id.
    #[must_use]
    pub fn server(id: ItemId) -> Self {
        Self(id.to_string())
    }

    /// Mint a fresh placeholder id for a guest catalog line.
    #[must_use]
    pub fn mint_local() -> Self {
        Self(format!("{LOCAL_LINE_PREFIX}{}", Uuid::new_v4()))
    }

    /// Mint a fresh placeholder id for a gift-card line.
    #[must_use]
    pub fn mint_gift_card() -> Self {
        Self(format!("{GIFT_CARD_LINE_PREFIX}{}", Uuid::new_v4()))
    }

    /// Whether this id was minted locally for a guest catalog line.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_LINE_PREFIX)
    }

    /// Whether this id was minted locally for a gift-card line.
    #[must_use]
    pub fn is_gift_card(&self) -> bool {
        self.0.starts_with(GIFT_CARD_LINE_PREFIX)
    }

    /// Whether this id refers to a server-owned line.
    #[must_use]
    pub fn is_server(&self) -> bool {
        !self.is_local() && !self.is_gift_card()
    }

    /// The server item id, if this is a server-owned line.
    #[must_use]
    pub fn as_item_id(&self) -> Option<ItemId> {
        if self.is_server() {
            Uuid::parse_str(&self.0).ok().map(ItemId::new)
        } else {
            None
        }
    }

    /// The raw string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ItemId> for LineId {
    fn from(id: ItemId) -> Self {
        Self::server(id)
    }
}
