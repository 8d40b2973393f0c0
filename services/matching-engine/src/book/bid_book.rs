//! Bid (buy-side) price levels
//!
//! Levels are keyed by price in a BTreeMap; the best bid is the highest
//! key, so best-first iteration walks the map in reverse. BTreeMap keeps
//! iteration deterministic.

use std::collections::BTreeMap;
use types::numeric::{Price, Quantity};

use super::price_level::PriceLevel;

/// Buy-side half of a book: levels consumed from the highest price down
#[derive(Debug, Clone, Default)]
pub struct BidBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// The level at `price`, created empty if absent
    pub fn level_entry(&mut self, price: Price) -> &mut PriceLevel {
        self.levels
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
    }

    pub fn level(&self, price: Price) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    pub fn level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    /// Drop the level at `price` entirely
    pub fn remove_level(&mut self, price: Price) {
        self.levels.remove(&price);
    }

    /// Best (highest) bid price
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next_back().copied()
    }

    /// Best bid level
    pub fn best_level(&self) -> Option<&PriceLevel> {
        self.levels.values().next_back()
    }

    /// Iterate levels best-first (highest price first)
    pub fn iter_best(&self) -> impl Iterator<Item = &PriceLevel> {
        self.levels.values().rev()
    }

    /// Top `depth` levels as (price, volume, order count), best first
    pub fn depth(&self, depth: usize) -> Vec<(Price, Quantity, usize)> {
        self.levels
            .values()
            .rev()
            .take(depth)
            .map(|level| (level.price(), level.total_volume(), level.order_count()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}
