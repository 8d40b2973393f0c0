//! Entity identifiers
//!
//! Every entity gets its own UUID newtype, so an order id can never be
//! handed to something expecting an account id. Ids minted in order flow
//! (orders, trades, accounts) use UUID v7, whose leading timestamp keeps
//! them roughly chronological in indexes and journals. Instruments are
//! configured up front rather than minted per command, so plain v4 is
//! enough there.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// One newtype per entity kind. The wrapper is identical for all of them;
// only the documentation and the minting constructor differ.
macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident, $mint:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh identifier.
            pub fn new() -> Self {
                Self($mint)
            }

            /// Adopt an id that arrived from outside (journal, client).
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// Identifies one order across its whole lifecycle, including after it
    /// has left the book and survives only in the event log.
    OrderId,
    Uuid::now_v7()
);

entity_id!(
    /// Identifies one executed trade.
    TradeId,
    Uuid::now_v7()
);

entity_id!(
    /// Identifies the account an order belongs to. The core carries it
    /// through events but never matches on it.
    AccountId,
    Uuid::now_v7()
);

entity_id!(
    /// Identifies a tradable instrument, and thereby the worker that owns
    /// its book.
    InstrumentId,
    Uuid::new_v4()
);

impl InstrumentId {
    /// The nil instrument, used by sentinel events not tied to any book.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_never_collide() {
        assert_ne!(OrderId::new(), OrderId::new());
        assert_ne!(TradeId::new(), TradeId::new());
        assert_ne!(AccountId::new(), AccountId::new());
        assert_ne!(InstrumentId::new(), InstrumentId::new());
    }

    #[test]
    fn ids_serialize_as_bare_uuid_strings() {
        let id = OrderId::new();
        let encoded = serde_json::to_string(&id).unwrap();
        // Transparent newtype: just the quoted UUID, no wrapper object
        assert_eq!(encoded, format!("\"{id}\""));
        assert_eq!(serde_json::from_str::<OrderId>(&encoded).unwrap(), id);
    }

    #[test]
    fn adopted_uuid_survives_the_roundtrip() {
        let raw = Uuid::new_v4();
        assert_eq!(*OrderId::from_uuid(raw).as_uuid(), raw);
        assert_eq!(*InstrumentId::from_uuid(raw).as_uuid(), raw);
    }

    #[test]
    fn nil_instrument_is_distinct_from_minted_ones() {
        assert_eq!(InstrumentId::nil(), InstrumentId::from_uuid(Uuid::nil()));
        assert_ne!(InstrumentId::new(), InstrumentId::nil());
    }
}
