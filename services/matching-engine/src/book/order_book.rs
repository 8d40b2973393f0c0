//! Single-instrument order book
//!
//! Two sides of price levels plus a fast order index. Orders live in a slab
//! arena; levels and the index refer to them by slot key, so cancellation
//! resolves in O(1) through the index and removal from a level costs at most
//! the number of orders queued at that price.
//!
//! Book operations that find the internal structures disagreeing (index entry
//! pointing at the wrong order, a level missing an indexed slot, crossed best
//! price caches) return fatal errors: the owning worker is expected to stop
//! serving the instrument rather than keep mutating a corrupt book.

use rust_decimal::Decimal;
use slab::Slab;
use std::collections::HashMap;
use thiserror::Error;
use types::ids::{InstrumentId, OrderId};
use types::numeric::{Price, Quantity};
use types::order::{Order, Side};

use super::ask_book::AskBook;
use super::bid_book::BidBook;

/// Errors from order book operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookError {
    #[error("order {0} is already indexed in the book")]
    DuplicateOrderId(OrderId),

    #[error("order {0} not found in the book")]
    OrderNotFound(OrderId),

    #[error("resting order must carry a limit price")]
    MissingLimitPrice,

    #[error("index entry for order {0} does not match its arena slot")]
    CorruptIndex(OrderId),

    #[error("price level {0} is inconsistent with its orders")]
    CorruptLevel(Price),

    #[error("best-price caches crossed: bid {bid} >= ask {ask}")]
    CrossedBook { bid: Price, ask: Price },

    #[error(transparent)]
    Order(#[from] types::errors::OrderError),
}

impl BookError {
    /// Whether this error means the book can no longer be trusted
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BookError::CorruptIndex(_)
                | BookError::CorruptLevel(_)
                | BookError::CrossedBook { .. }
                | BookError::Order(_)
        )
    }
}

/// Where a resting order lives: side, level key, arena slot
#[derive(Debug, Clone, Copy)]
struct OrderLocation {
    side: Side,
    price: Price,
    slot: usize,
}

/// Result of applying a match against a resting maker
#[derive(Debug, Clone)]
pub struct MatchedMaker {
    /// Maker state after the fill was applied
    pub order: Order,
    /// True if the maker was fully filled and left the book
    pub removed: bool,
}

/// Limit order book for one instrument
#[derive(Debug)]
pub struct OrderBook {
    instrument_id: InstrumentId,
    /// Arena holding every resting order
    orders: Slab<Order>,
    bids: BidBook,
    asks: AskBook,
    /// O(1) lookup: order id → (side, price, slot)
    index: HashMap<OrderId, OrderLocation>,
    /// Cached best prices for constant-time queries
    best_bid: Option<Price>,
    best_ask: Option<Price>,
}

impl OrderBook {
    /// Create a new empty order book for one instrument
    pub fn new(instrument_id: InstrumentId) -> Self {
        Self {
            instrument_id,
            orders: Slab::new(),
            bids: BidBook::new(),
            asks: AskBook::new(),
            index: HashMap::new(),
            best_bid: None,
            best_ask: None,
        }
    }

    pub fn instrument_id(&self) -> InstrumentId {
        self.instrument_id
    }

    /// Insert a not-fully-matched remainder at its limit price.
    ///
    /// Creates the level on demand, indexes the order, and refreshes the
    /// cached best price when the insert sets a new extremum.
    pub fn add_resting(&mut self, order: Order) -> Result<(), BookError> {
        let price = order.limit_price.ok_or(BookError::MissingLimitPrice)?;
        if self.index.contains_key(&order.id) {
            return Err(BookError::DuplicateOrderId(order.id));
        }

        let id = order.id;
        let side = order.side;
        let remaining = order.remaining_base;
        let slot = self.orders.insert(order);

        match side {
            Side::Bid => self.bids.level_entry(price).push_back(slot, remaining),
            Side::Ask => self.asks.level_entry(price).push_back(slot, remaining),
        }
        self.index.insert(id, OrderLocation { side, price, slot });

        match side {
            Side::Bid if self.best_bid.map_or(true, |p| price > p) => self.best_bid = Some(price),
            Side::Ask if self.best_ask.map_or(true, |p| price < p) => self.best_ask = Some(price),
            _ => {}
        }

        if let (Some(bid), Some(ask)) = (self.best_bid, self.best_ask) {
            if bid >= ask {
                return Err(BookError::CrossedBook { bid, ask });
            }
        }
        Ok(())
    }

    /// Remove an order from its level via the index.
    ///
    /// Returns the order as it rested; the caller applies the status
    /// transition. Drops the level if it becomes empty and refreshes the
    /// best-price cache when needed.
    pub fn cancel(&mut self, order_id: OrderId) -> Result<Order, BookError> {
        let location = self
            .index
            .remove(&order_id)
            .ok_or(BookError::OrderNotFound(order_id))?;

        let order = self
            .orders
            .try_remove(location.slot)
            .ok_or(BookError::CorruptIndex(order_id))?;
        if order.id != order_id {
            return Err(BookError::CorruptIndex(order_id));
        }

        self.detach_slot(location, order.remaining_base)?;
        Ok(order)
    }

    /// Apply a fill of `base` (with `quote` total value) to a resting order.
    ///
    /// Partial fills keep the order's queue position; a full fill pops it
    /// from the level, the index, and the arena.
    pub fn apply_match(
        &mut self,
        order_id: OrderId,
        base: Quantity,
        quote: Decimal,
        timestamp: i64,
    ) -> Result<MatchedMaker, BookError> {
        let location = *self
            .index
            .get(&order_id)
            .ok_or(BookError::OrderNotFound(order_id))?;

        let order = self
            .orders
            .get_mut(location.slot)
            .ok_or(BookError::CorruptIndex(order_id))?;
        if order.id != order_id {
            return Err(BookError::CorruptIndex(order_id));
        }

        order.fill(base, quote, timestamp)?;
        let snapshot = order.clone();

        if snapshot.is_filled() {
            self.orders.remove(location.slot);
            self.index.remove(&order_id);
            self.detach_slot(location, base)?;
            Ok(MatchedMaker {
                order: snapshot,
                removed: true,
            })
        } else {
            let level = match location.side {
                Side::Bid => self.bids.level_mut(location.price),
                Side::Ask => self.asks.level_mut(location.price),
            }
            .ok_or(BookError::CorruptLevel(location.price))?;
            level.reduce(base);
            Ok(MatchedMaker {
                order: snapshot,
                removed: false,
            })
        }
    }

    /// The head order of the best level on the side opposing `taker_side`
    pub fn peek_counter(&self, taker_side: Side) -> Option<&Order> {
        let level = match taker_side {
            Side::Bid => self.asks.best_level(),
            Side::Ask => self.bids.best_level(),
        }?;
        self.orders.get(level.front()?)
    }

    /// Walk opposing levels inside the price bound and report whether
    /// `base` is fully coverable. Does not mutate state.
    ///
    /// `limit_price` of None means no bound (market order semantics).
    pub fn check_fok_liquidity(
        &self,
        taker_side: Side,
        limit_price: Option<Price>,
        base: Quantity,
    ) -> bool {
        let mut needed = base.as_decimal();
        let levels: Box<dyn Iterator<Item = &super::price_level::PriceLevel> + '_> =
            match taker_side {
                Side::Bid => Box::new(self.asks.iter_best()),
                Side::Ask => Box::new(self.bids.iter_best()),
            };
        for level in levels {
            let in_bound = match (taker_side, limit_price) {
                (_, None) => true,
                (Side::Bid, Some(limit)) => level.price() <= limit,
                (Side::Ask, Some(limit)) => level.price() >= limit,
            };
            if !in_bound {
                break;
            }
            needed -= level.total_volume().as_decimal();
            if needed <= Decimal::ZERO {
                return true;
            }
        }
        false
    }

    /// Cached best bid price
    pub fn best_bid(&self) -> Option<Price> {
        self.best_bid
    }

    /// Cached best ask price
    pub fn best_ask(&self) -> Option<Price> {
        self.best_ask
    }

    /// Difference between best ask and best bid, if both exist
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask, self.best_bid) {
            (Some(ask), Some(bid)) => Some(ask.as_decimal() - bid.as_decimal()),
            _ => None,
        }
    }

    /// Total resting volume at one price, from the level's cached field
    pub fn volume_at(&self, side: Side, price: Price) -> Quantity {
        let level = match side {
            Side::Bid => self.bids.level(price),
            Side::Ask => self.asks.level(price),
        };
        level.map_or_else(Quantity::zero, |l| l.total_volume())
    }

    /// Number of resting orders at one price
    pub fn orders_at(&self, side: Side, price: Price) -> usize {
        let level = match side {
            Side::Bid => self.bids.level(price),
            Side::Ask => self.asks.level(price),
        };
        level.map_or(0, |l| l.order_count())
    }

    /// Look up a resting order by id
    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        let location = self.index.get(&order_id)?;
        self.orders.get(location.slot)
    }

    /// Top `depth` levels per side, best first
    pub fn depth(&self, depth: usize) -> (Vec<(Price, Quantity, usize)>, Vec<(Price, Quantity, usize)>) {
        (self.bids.depth(depth), self.asks.depth(depth))
    }

    /// Total number of resting orders across both sides
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Sum of cached level volumes for one side
    pub fn side_volume(&self, side: Side) -> Quantity {
        let levels: Box<dyn Iterator<Item = &super::price_level::PriceLevel> + '_> = match side {
            Side::Bid => Box::new(self.bids.iter_best()),
            Side::Ask => Box::new(self.asks.iter_best()),
        };
        levels.fold(Quantity::zero(), |acc, level| acc + level.total_volume())
    }

    /// Iterate every resting order (arena order, not priority order)
    pub fn iter_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().map(|(_, order)| order)
    }

    /// Remove `slot` from its level, dropping the level if emptied and
    /// refreshing the best cache when the removed level was the extremum.
    ///
    /// Matching always consumes the head of a level, so the common case is
    /// the O(1) front pop; the positional scan only runs for cancellations
    /// of orders queued deeper in the level.
    fn detach_slot(&mut self, location: OrderLocation, remaining: Quantity) -> Result<(), BookError> {
        match location.side {
            Side::Bid => {
                let level = self
                    .bids
                    .level_mut(location.price)
                    .ok_or(BookError::CorruptLevel(location.price))?;
                let detached = if level.front() == Some(location.slot) {
                    level.pop_front(remaining).is_some()
                } else {
                    level.remove(location.slot, remaining)
                };
                if !detached {
                    return Err(BookError::CorruptLevel(location.price));
                }
                if level.is_empty() {
                    self.bids.remove_level(location.price);
                    if self.best_bid == Some(location.price) {
                        self.best_bid = self.bids.best_price();
                    }
                }
            }
            Side::Ask => {
                let level = self
                    .asks
                    .level_mut(location.price)
                    .ok_or(BookError::CorruptLevel(location.price))?;
                let detached = if level.front() == Some(location.slot) {
                    level.pop_front(remaining).is_some()
                } else {
                    level.remove(location.slot, remaining)
                };
                if !detached {
                    return Err(BookError::CorruptLevel(location.price));
                }
                if level.is_empty() {
                    self.asks.remove_level(location.price);
                    if self.best_ask == Some(location.price) {
                        self.best_ask = self.asks.best_price();
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use types::ids::AccountId;
    use types::order::{OrderType, TimeInForce};

    const TS: i64 = 1708123456789000000;

    fn resting(side: Side, price: u64, amount: &str, instrument: InstrumentId) -> Order {
        let mut order = Order::limit(
            AccountId::new(),
            instrument,
            side,
            Price::from_u64(price),
            Quantity::from_str(amount).unwrap(),
            TimeInForce::GTC,
            TS,
        );
        order.status = types::order::OrderStatus::New;
        order
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::new(InstrumentId::new());
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.spread(), None);
        assert!(book.is_empty());
        assert_eq!(
            book.volume_at(Side::Bid, Price::from_u64(100)),
            Quantity::zero()
        );
    }

    #[test]
    fn test_add_resting_updates_caches() {
        let instrument = InstrumentId::new();
        let mut book = OrderBook::new(instrument);

        book.add_resting(resting(Side::Bid, 100, "1.0", instrument)).unwrap();
        book.add_resting(resting(Side::Ask, 105, "2.0", instrument)).unwrap();

        assert_eq!(book.best_bid(), Some(Price::from_u64(100)));
        assert_eq!(book.best_ask(), Some(Price::from_u64(105)));
        assert_eq!(book.spread(), Some(dec!(5)));
        assert_eq!(
            book.volume_at(Side::Bid, Price::from_u64(100)),
            Quantity::from_str("1.0").unwrap()
        );
        assert_eq!(book.orders_at(Side::Ask, Price::from_u64(105)), 1);
    }

    #[test]
    fn test_duplicate_order_id_rejected() {
        let instrument = InstrumentId::new();
        let mut book = OrderBook::new(instrument);
        let order = resting(Side::Bid, 100, "1.0", instrument);

        book.add_resting(order.clone()).unwrap();
        let err = book.add_resting(order.clone()).unwrap_err();
        assert_eq!(err, BookError::DuplicateOrderId(order.id));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_crossed_insert_is_fatal() {
        let instrument = InstrumentId::new();
        let mut book = OrderBook::new(instrument);
        book.add_resting(resting(Side::Ask, 100, "1.0", instrument)).unwrap();

        let err = book
            .add_resting(resting(Side::Bid, 101, "1.0", instrument))
            .unwrap_err();
        assert!(matches!(err, BookError::CrossedBook { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_cancel_removes_order_and_level() {
        let instrument = InstrumentId::new();
        let mut book = OrderBook::new(instrument);
        let order = resting(Side::Bid, 100, "1.0", instrument);
        let order_id = order.id;

        book.add_resting(order).unwrap();
        let removed = book.cancel(order_id).unwrap();
        assert_eq!(removed.id, order_id);
        assert!(book.is_empty());
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn test_cancel_unknown_order() {
        let mut book = OrderBook::new(InstrumentId::new());
        let missing = OrderId::new();
        assert_eq!(
            book.cancel(missing).unwrap_err(),
            BookError::OrderNotFound(missing)
        );
    }

    #[test]
    fn test_cancel_refreshes_best_price() {
        let instrument = InstrumentId::new();
        let mut book = OrderBook::new(instrument);
        let best = resting(Side::Bid, 101, "1.0", instrument);
        let best_id = best.id;
        book.add_resting(resting(Side::Bid, 100, "1.0", instrument)).unwrap();
        book.add_resting(best).unwrap();

        assert_eq!(book.best_bid(), Some(Price::from_u64(101)));
        book.cancel(best_id).unwrap();
        assert_eq!(book.best_bid(), Some(Price::from_u64(100)));
    }

    #[test]
    fn test_apply_match_partial_keeps_position() {
        let instrument = InstrumentId::new();
        let mut book = OrderBook::new(instrument);
        let first = resting(Side::Ask, 100, "1.0", instrument);
        let first_id = first.id;
        book.add_resting(first).unwrap();
        book.add_resting(resting(Side::Ask, 100, "2.0", instrument)).unwrap();

        let matched = book
            .apply_match(first_id, Quantity::from_str("0.4").unwrap(), dec!(40), TS + 1)
            .unwrap();
        assert!(!matched.removed);
        assert_eq!(
            matched.order.remaining_base,
            Quantity::from_str("0.6").unwrap()
        );

        // Still first in line and the level volume reflects the fill
        assert_eq!(book.peek_counter(Side::Bid).unwrap().id, first_id);
        assert_eq!(
            book.volume_at(Side::Ask, Price::from_u64(100)),
            Quantity::from_str("2.6").unwrap()
        );
    }

    #[test]
    fn test_apply_match_full_pops_head() {
        let instrument = InstrumentId::new();
        let mut book = OrderBook::new(instrument);
        let first = resting(Side::Ask, 100, "1.0", instrument);
        let second = resting(Side::Ask, 100, "2.0", instrument);
        let (first_id, second_id) = (first.id, second.id);
        book.add_resting(first).unwrap();
        book.add_resting(second).unwrap();

        let matched = book
            .apply_match(first_id, Quantity::from_str("1.0").unwrap(), dec!(100), TS + 1)
            .unwrap();
        assert!(matched.removed);
        assert_eq!(matched.order.status, types::order::OrderStatus::Filled);
        assert_eq!(book.peek_counter(Side::Bid).unwrap().id, second_id);
        assert_eq!(book.order_count(), 1);
    }

    #[test]
    fn test_peek_counter_best_first() {
        let instrument = InstrumentId::new();
        let mut book = OrderBook::new(instrument);
        book.add_resting(resting(Side::Ask, 105, "1.0", instrument)).unwrap();
        let cheap = resting(Side::Ask, 100, "1.0", instrument);
        let cheap_id = cheap.id;
        book.add_resting(cheap).unwrap();

        assert_eq!(book.peek_counter(Side::Bid).unwrap().id, cheap_id);
        assert!(book.peek_counter(Side::Ask).is_none());
    }

    #[test]
    fn test_check_fok_liquidity_with_bound() {
        let instrument = InstrumentId::new();
        let mut book = OrderBook::new(instrument);
        book.add_resting(resting(Side::Ask, 100, "0.4", instrument)).unwrap();
        book.add_resting(resting(Side::Ask, 101, "0.5", instrument)).unwrap();
        book.add_resting(resting(Side::Ask, 110, "5.0", instrument)).unwrap();

        let limit = Some(Price::from_u64(101));
        // 0.9 available within the bound
        assert!(book.check_fok_liquidity(
            Side::Bid,
            limit,
            Quantity::from_str("0.9").unwrap()
        ));
        assert!(!book.check_fok_liquidity(
            Side::Bid,
            limit,
            Quantity::from_str("1.0").unwrap()
        ));
        // Without a bound the deep level counts
        assert!(book.check_fok_liquidity(
            Side::Bid,
            None,
            Quantity::from_str("1.0").unwrap()
        ));
    }

    #[test]
    fn test_side_volume_matches_order_remainders() {
        let instrument = InstrumentId::new();
        let mut book = OrderBook::new(instrument);
        book.add_resting(resting(Side::Bid, 99, "1.5", instrument)).unwrap();
        book.add_resting(resting(Side::Bid, 100, "2.5", instrument)).unwrap();

        let from_levels = book.side_volume(Side::Bid);
        let from_orders = book
            .iter_orders()
            .filter(|o| o.side == Side::Bid)
            .fold(Quantity::zero(), |acc, o| acc + o.remaining_base);
        assert_eq!(from_levels, from_orders);
        assert_eq!(from_levels, Quantity::from_str("4.0").unwrap());
    }

    #[test]
    fn test_market_order_cannot_rest() {
        let instrument = InstrumentId::new();
        let mut book = OrderBook::new(instrument);
        let order = Order::new(
            AccountId::new(),
            instrument,
            Side::Bid,
            OrderType::Market,
            None,
            None,
            Quantity::from_str("1.0").unwrap(),
            TimeInForce::IOC,
            TS,
        );
        assert_eq!(
            book.add_resting(order).unwrap_err(),
            BookError::MissingLimitPrice
        );
    }
}
