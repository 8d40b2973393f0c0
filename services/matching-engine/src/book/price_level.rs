//! Price level with FIFO queue
//!
//! A price level holds every resting order at one price point, in strict
//! arrival order. The level stores slab slot keys only; the order data
//! itself lives in the book's arena. Cached volume and count make the
//! aggregate queries constant-time.

use std::collections::VecDeque;
use types::numeric::{Price, Quantity};

/// Orders at a single price, oldest first
#[derive(Debug, Clone)]
pub struct PriceLevel {
    /// The price for this level
    price: Price,
    /// Slab slot keys in FIFO order
    queue: VecDeque<usize>,
    /// Cached total remaining base volume at this level
    total_volume: Quantity,
}

impl PriceLevel {
    /// Create a new empty price level
    pub fn new(price: Price) -> Self {
        Self {
            price,
            queue: VecDeque::with_capacity(4),
            total_volume: Quantity::zero(),
        }
    }

    /// The price this level aggregates
    pub fn price(&self) -> Price {
        self.price
    }

    /// Append a slot at the back of the queue (time priority)
    pub fn push_back(&mut self, slot: usize, remaining: Quantity) {
        self.queue.push_back(slot);
        self.total_volume = self.total_volume + remaining;
    }

    /// The slot at the front of the queue, next in line to match
    pub fn front(&self) -> Option<usize> {
        self.queue.front().copied()
    }

    /// Pop the front slot after it has been fully consumed.
    ///
    /// `remaining` is the amount the order still carried in the cached
    /// volume (zero if fills already reduced it).
    pub fn pop_front(&mut self, remaining: Quantity) -> Option<usize> {
        let slot = self.queue.pop_front()?;
        self.total_volume = self
            .total_volume
            .checked_sub(remaining)
            .unwrap_or_else(Quantity::zero);
        Some(slot)
    }

    /// Remove a slot from any position in the queue.
    ///
    /// Returns false if the slot is not present. Linear in the number of
    /// orders at this level; the caller already resolved the slot through
    /// the book index.
    pub fn remove(&mut self, slot: usize, remaining: Quantity) -> bool {
        let Some(position) = self.queue.iter().position(|s| *s == slot) else {
            return false;
        };
        self.queue.remove(position);
        self.total_volume = self
            .total_volume
            .checked_sub(remaining)
            .unwrap_or_else(Quantity::zero);
        true
    }

    /// Reduce the cached volume after a partial fill of any queued order.
    /// The order keeps its queue position.
    pub fn reduce(&mut self, amount: Quantity) {
        self.total_volume = self
            .total_volume
            .checked_sub(amount)
            .unwrap_or_else(Quantity::zero);
    }

    /// Iterate slots in time order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.queue.iter().copied()
    }

    /// Check if the price level is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Cached total remaining base volume
    pub fn total_volume(&self) -> Quantity {
        self.total_volume
    }

    /// Number of orders at this level
    pub fn order_count(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(s: &str) -> Quantity {
        Quantity::from_str(s).unwrap()
    }

    #[test]
    fn test_price_level_push() {
        let mut level = PriceLevel::new(Price::from_u64(50000));
        level.push_back(7, qty("1.5"));

        assert_eq!(level.order_count(), 1);
        assert_eq!(level.total_volume(), qty("1.5"));
        assert_eq!(level.front(), Some(7));
        assert!(!level.is_empty());
    }

    #[test]
    fn test_price_level_fifo_order() {
        let mut level = PriceLevel::new(Price::from_u64(50000));
        level.push_back(1, qty("1.0"));
        level.push_back(2, qty("2.0"));
        level.push_back(3, qty("3.0"));

        assert_eq!(level.front(), Some(1));
        let collected: Vec<usize> = level.iter().collect();
        assert_eq!(collected, vec![1, 2, 3]);
        assert_eq!(level.total_volume(), qty("6.0"));
    }

    #[test]
    fn test_price_level_pop_front() {
        let mut level = PriceLevel::new(Price::from_u64(50000));
        level.push_back(1, qty("1.0"));
        level.push_back(2, qty("2.0"));

        assert_eq!(level.pop_front(qty("1.0")), Some(1));
        assert_eq!(level.front(), Some(2));
        assert_eq!(level.total_volume(), qty("2.0"));
    }

    #[test]
    fn test_price_level_remove_middle() {
        let mut level = PriceLevel::new(Price::from_u64(50000));
        level.push_back(1, qty("1.0"));
        level.push_back(2, qty("2.0"));
        level.push_back(3, qty("3.0"));

        assert!(level.remove(2, qty("2.0")));
        let collected: Vec<usize> = level.iter().collect();
        assert_eq!(collected, vec![1, 3]);
        assert_eq!(level.total_volume(), qty("4.0"));
    }

    #[test]
    fn test_price_level_remove_missing() {
        let mut level = PriceLevel::new(Price::from_u64(50000));
        level.push_back(1, qty("1.0"));

        assert!(!level.remove(99, qty("1.0")));
        assert_eq!(level.order_count(), 1);
        assert_eq!(level.total_volume(), qty("1.0"));
    }

    #[test]
    fn test_price_level_reduce_keeps_position() {
        let mut level = PriceLevel::new(Price::from_u64(50000));
        level.push_back(1, qty("5.0"));
        level.push_back(2, qty("1.0"));

        level.reduce(qty("2.0"));
        assert_eq!(level.front(), Some(1));
        assert_eq!(level.total_volume(), qty("4.0"));
        assert_eq!(level.order_count(), 2);
    }
}
