//! Multi-instrument limit order book matching engine
//!
//! Price-time priority matching for limit, market, stop, and stop-limit
//! orders under GTC/IOC/FOK time-in-force, orchestrated as one
//! single-threaded worker per instrument behind a routing manager, with a
//! broadcast event bus as the sole integration surface.
//!
//! **Key invariants:**
//! - Strict price-time priority; trades execute at the maker's price
//! - `filled + remaining == total` on every order at every observable moment
//! - Book, depth tracker, and event log mutate atomically per command
//! - Per-instrument event sequences are contiguous and strictly increasing
//! - A corrupted book isolates its own instrument and nothing else

pub mod book;
pub mod bus;
pub mod config;
pub mod depth;
pub mod events;
pub mod manager;
pub mod matching;
pub mod oracle;
pub mod worker;

pub use bus::{EventBus, EventSubscriber};
pub use config::{EngineConfig, InstrumentConfig, MarketOnEmpty};
pub use depth::{DepthLevel, DepthTracker, DepthView};
pub use events::{EngineEvent, EventPayload};
pub use manager::{EngineError, EngineManager};
pub use matching::{Matcher, ProcessOutcome};
pub use oracle::{FixedReference, ReferencePriceSource};
pub use worker::{BookState, CommandReceipt};
