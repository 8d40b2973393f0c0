//! Engine event definitions
//!
//! Every event carries the instrument it belongs to, a monotonic
//! per-instrument sequence number, and a unix-nano timestamp. Payloads are
//! tagged so journaled records stay self-describing.

use serde::{Deserialize, Serialize};
use types::ids::{InstrumentId, OrderId};
use types::numeric::Price;
use types::order::{Order, OrderStatus};
use types::trade::Trade;

use crate::depth::DepthView;

/// An event published by an engine worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Per-instrument monotonic sequence number, starting at 1.
    /// Sentinel events synthesized outside a worker use 0.
    pub sequence: u64,
    pub instrument_id: InstrumentId,
    pub timestamp: i64, // Unix nanos
    pub payload: EventPayload,
}

/// Kind-specific event payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventPayload {
    /// Order passed validation and entered processing
    OrderAccepted { order: Order },

    /// Order failed validation and was never placed
    OrderRejected { order: Order, reason: String },

    /// A resting remainder was inserted into the book
    OrderAdded { order: Order },

    /// An order participated in a match; one event per side per trade
    OrderMatched { order: Order, matched_base: types::numeric::Quantity },

    /// A trade was executed between maker and taker
    TradeExecuted { trade: Trade },

    /// An order left the book (or the trigger pool) by cancellation
    OrderCancelled { order: Order },

    /// A cancel command referenced an unknown order
    OrderCancelRejected { order_id: OrderId, reason: String },

    /// An order moved between lifecycle statuses
    OrderStatusChanged {
        order_id: OrderId,
        previous: OrderStatus,
        current: OrderStatus,
    },

    /// Coalesced aggregated-book update, at most one per command
    DepthUpdated { depth: DepthView },

    /// A conditional order's trigger condition was met
    TriggerFired {
        order: Order,
        reference_price: Price,
    },

    /// The book stopped admitting new orders
    BookHalted,

    /// The book resumed admitting new orders
    BookResumed,

    /// The book hit an unrecoverable invariant violation and was isolated
    BookFaulted { message: String },

    /// This subscriber fell behind and `missed` events were dropped for it
    SubscriberLagged { missed: u64 },
}

impl EngineEvent {
    /// Kind label for logging and journal records
    pub fn kind(&self) -> &'static str {
        match &self.payload {
            EventPayload::OrderAccepted { .. } => "OrderAccepted",
            EventPayload::OrderRejected { .. } => "OrderRejected",
            EventPayload::OrderAdded { .. } => "OrderAdded",
            EventPayload::OrderMatched { .. } => "OrderMatched",
            EventPayload::TradeExecuted { .. } => "TradeExecuted",
            EventPayload::OrderCancelled { .. } => "OrderCancelled",
            EventPayload::OrderCancelRejected { .. } => "OrderCancelRejected",
            EventPayload::OrderStatusChanged { .. } => "OrderStatusChanged",
            EventPayload::DepthUpdated { .. } => "DepthUpdated",
            EventPayload::TriggerFired { .. } => "TriggerFired",
            EventPayload::BookHalted => "BookHalted",
            EventPayload::BookResumed => "BookResumed",
            EventPayload::BookFaulted { .. } => "BookFaulted",
            EventPayload::SubscriberLagged { .. } => "SubscriberLagged",
        }
    }

    /// Synthesized marker for a subscriber that dropped `missed` events
    pub fn lag_sentinel(missed: u64, timestamp: i64) -> Self {
        Self {
            sequence: 0,
            instrument_id: InstrumentId::nil(),
            timestamp,
            payload: EventPayload::SubscriberLagged { missed },
        }
    }
}
