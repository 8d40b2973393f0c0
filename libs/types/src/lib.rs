//! Core types for the matching engine workspace
//!
//! # Modules
//! - `ids`: unique identifiers (OrderId, TradeId, AccountId, InstrumentId)
//! - `numeric`: fixed-point decimal types (Price, Quantity) and quote rounding
//! - `order`: order entity and lifecycle transitions
//! - `trade`: trade entity
//! - `errors`: transition errors and validation reject reasons

pub mod errors;
pub mod ids;
pub mod numeric;
pub mod order;
pub mod trade;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::trade::*;
}
