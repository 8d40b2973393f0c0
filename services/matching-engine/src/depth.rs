//! Order book depth tracker
//!
//! Maintains cached aggregated views of one book so depth queries never walk
//! the book itself. Mutations are applied by the matcher in the same step as
//! the book mutation, from the owning worker's thread, so the tracker needs
//! no locking and stays coherent with the book: after any committed step the
//! sum of level volumes equals the sum of resting order remainders.

use serde::{Deserialize, Serialize};
use std::collections::{btree_map::Entry, BTreeMap};
use types::ids::InstrumentId;
use types::numeric::{Price, Quantity};
use types::order::Side;

/// Aggregated volume information at one price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    /// Total remaining base volume at this price
    pub volume: Quantity,
    /// Number of resting orders at this price
    pub order_count: u32,
}

/// Immutable snapshot of the aggregated book, capped at N levels per side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthView {
    pub instrument_id: InstrumentId,
    /// Bid levels ordered by price descending (best first)
    pub bids: Vec<DepthLevel>,
    /// Ask levels ordered by price ascending (best first)
    pub asks: Vec<DepthLevel>,
    pub timestamp: i64, // Unix nanos
}

impl DepthView {
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|level| level.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|level| level.price)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Real-time tracker of aggregated book depth
#[derive(Debug)]
pub struct DepthTracker {
    instrument_id: InstrumentId,
    bids: BTreeMap<Price, DepthLevel>,
    asks: BTreeMap<Price, DepthLevel>,
}

impl DepthTracker {
    pub fn new(instrument_id: InstrumentId) -> Self {
        Self {
            instrument_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    /// Record a new resting order
    pub fn order_added(&mut self, side: Side, price: Price, remaining: Quantity) {
        let levels = self.side_mut(side);
        match levels.entry(price) {
            Entry::Vacant(entry) => {
                entry.insert(DepthLevel {
                    price,
                    volume: remaining,
                    order_count: 1,
                });
            }
            Entry::Occupied(mut entry) => {
                let level = entry.get_mut();
                level.volume = level.volume + remaining;
                level.order_count += 1;
            }
        }
    }

    /// Record an order leaving the book with `remaining` still unfilled
    pub fn order_removed(&mut self, side: Side, price: Price, remaining: Quantity) {
        let levels = self.side_mut(side);
        if let Entry::Occupied(mut entry) = levels.entry(price) {
            let level = entry.get_mut();
            level.volume = level
                .volume
                .checked_sub(remaining)
                .unwrap_or_else(Quantity::zero);
            level.order_count = level.order_count.saturating_sub(1);
            if level.order_count == 0 || level.volume.is_zero() {
                entry.remove();
            }
        }
    }

    /// Record a fill against a resting order; `removed` marks a full fill
    pub fn order_matched(&mut self, side: Side, price: Price, base: Quantity, removed: bool) {
        let levels = self.side_mut(side);
        if let Entry::Occupied(mut entry) = levels.entry(price) {
            let level = entry.get_mut();
            level.volume = level
                .volume
                .checked_sub(base)
                .unwrap_or_else(Quantity::zero);
            if removed {
                level.order_count = level.order_count.saturating_sub(1);
            }
            if level.order_count == 0 || (removed && level.volume.is_zero()) {
                entry.remove();
            }
        }
    }

    /// Snapshot of at most `limit` levels per side
    pub fn snapshot(&self, limit: usize, timestamp: i64) -> DepthView {
        let bids = self
            .bids
            .values()
            .rev()
            .take(limit)
            .copied()
            .collect();
        let asks = self.asks.values().take(limit).copied().collect();
        DepthView {
            instrument_id: self.instrument_id,
            bids,
            asks,
            timestamp,
        }
    }

    /// Sum of tracked volume on one side (coherence checks)
    pub fn side_volume(&self, side: Side) -> Quantity {
        let levels = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };
        levels
            .values()
            .fold(Quantity::zero(), |acc, level| acc + level.volume)
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Price, DepthLevel> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }
}
