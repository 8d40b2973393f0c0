//! Trigger pool for stop and stop-limit orders
//!
//! Dormant conditional orders keyed by `(side, trigger_price)`, FIFO within
//! a price. A bid stop becomes eligible when the reference price rises to or
//! above its trigger; an ask stop when the reference falls to or below its
//! trigger. Eligible orders pop one at a time, lowest trigger first for bid
//! stops and highest first for ask stops (the order in which a moving
//! reference would have crossed them), then by arrival.

use std::collections::{BTreeMap, HashMap, VecDeque};
use types::ids::OrderId;
use types::numeric::Price;
use types::order::{Order, Side};

#[derive(Debug, Default)]
pub struct TriggerPool {
    /// Bid stops: eligible when reference >= trigger
    bid_stops: BTreeMap<Price, VecDeque<(u64, Order)>>,
    /// Ask stops: eligible when reference <= trigger
    ask_stops: BTreeMap<Price, VecDeque<(u64, Order)>>,
    /// order id → (side, trigger price) for cancellation
    index: HashMap<OrderId, (Side, Price)>,
    /// Arrival counter for tie-breaks across sides
    next_arrival: u64,
}

impl TriggerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a waiting order. The caller has validated that `trigger_price`
    /// is present.
    pub fn insert(&mut self, order: Order) {
        let Some(trigger) = order.trigger_price else {
            return;
        };
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        self.index.insert(order.id, (order.side, trigger));
        let queue = match order.side {
            Side::Bid => self.bid_stops.entry(trigger).or_default(),
            Side::Ask => self.ask_stops.entry(trigger).or_default(),
        };
        queue.push_back((arrival, order));
    }

    /// Remove a waiting order by id (user cancellation)
    pub fn remove(&mut self, order_id: OrderId) -> Option<Order> {
        let (side, trigger) = self.index.remove(&order_id)?;
        let stops = match side {
            Side::Bid => &mut self.bid_stops,
            Side::Ask => &mut self.ask_stops,
        };
        let queue = stops.get_mut(&trigger)?;
        let position = queue.iter().position(|(_, o)| o.id == order_id)?;
        let (_, order) = queue.remove(position)?;
        if queue.is_empty() {
            stops.remove(&trigger);
        }
        Some(order)
    }

    /// Pop the single next order made eligible by `reference`, if any.
    ///
    /// Callers loop, re-reading the reference price between pops, so a
    /// trigger cascade fires in the order the moving price crossed it.
    pub fn pop_eligible(&mut self, reference: Price) -> Option<Order> {
        let bid_candidate = self
            .bid_stops
            .range(..=reference)
            .next()
            .map(|(price, queue)| (*price, queue.front().map(|(arrival, _)| *arrival)));
        let ask_candidate = self
            .ask_stops
            .range(reference..)
            .next_back()
            .map(|(price, queue)| (*price, queue.front().map(|(arrival, _)| *arrival)));

        let side = match (bid_candidate, ask_candidate) {
            (None, None) => return None,
            (Some(_), None) => Side::Bid,
            (None, Some(_)) => Side::Ask,
            (Some((bid_price, bid_arrival)), Some((ask_price, ask_arrival))) => {
                let bid_distance = reference.as_decimal() - bid_price.as_decimal();
                let ask_distance = ask_price.as_decimal() - reference.as_decimal();
                if bid_distance < ask_distance {
                    Side::Bid
                } else if ask_distance < bid_distance {
                    Side::Ask
                } else if bid_arrival <= ask_arrival {
                    Side::Bid
                } else {
                    Side::Ask
                }
            }
        };

        let (stops, price) = match side {
            Side::Bid => (&mut self.bid_stops, bid_candidate?.0),
            Side::Ask => (&mut self.ask_stops, ask_candidate?.0),
        };
        let queue = stops.get_mut(&price)?;
        let (_, order) = queue.pop_front()?;
        if queue.is_empty() {
            stops.remove(&price);
        }
        self.index.remove(&order.id);
        Some(order)
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.index.contains_key(&order_id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{AccountId, InstrumentId};
    use types::numeric::Quantity;
    use types::order::{OrderStatus, OrderType, TimeInForce};

    const TS: i64 = 1708123456789000000;

    fn stop(side: Side, trigger: u64) -> Order {
        let mut order = Order::new(
            AccountId::new(),
            InstrumentId::new(),
            side,
            OrderType::Stop,
            None,
            Some(Price::from_u64(trigger)),
            Quantity::from_u64(1),
            TimeInForce::GTC,
            TS,
        );
        order.status = OrderStatus::WaitingTrigger;
        order
    }

    #[test]
    fn test_bid_stop_fires_at_or_above_trigger() {
        let mut pool = TriggerPool::new();
        pool.insert(stop(Side::Bid, 105));

        assert!(pool.pop_eligible(Price::from_u64(104)).is_none());
        let fired = pool.pop_eligible(Price::from_u64(105)).unwrap();
        assert_eq!(fired.trigger_price, Some(Price::from_u64(105)));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_ask_stop_fires_at_or_below_trigger() {
        let mut pool = TriggerPool::new();
        pool.insert(stop(Side::Ask, 95));

        assert!(pool.pop_eligible(Price::from_u64(96)).is_none());
        assert!(pool.pop_eligible(Price::from_u64(95)).is_some());
    }

    #[test]
    fn test_bid_stops_pop_lowest_trigger_first() {
        let mut pool = TriggerPool::new();
        pool.insert(stop(Side::Bid, 103));
        pool.insert(stop(Side::Bid, 101));
        pool.insert(stop(Side::Bid, 102));

        let reference = Price::from_u64(110);
        let order1 = pool.pop_eligible(reference).unwrap();
        let order2 = pool.pop_eligible(reference).unwrap();
        let order3 = pool.pop_eligible(reference).unwrap();
        assert_eq!(order1.trigger_price, Some(Price::from_u64(101)));
        assert_eq!(order2.trigger_price, Some(Price::from_u64(102)));
        assert_eq!(order3.trigger_price, Some(Price::from_u64(103)));
    }

    #[test]
    fn test_ask_stops_pop_highest_trigger_first() {
        let mut pool = TriggerPool::new();
        pool.insert(stop(Side::Ask, 97));
        pool.insert(stop(Side::Ask, 99));

        let reference = Price::from_u64(90);
        assert_eq!(
            pool.pop_eligible(reference).unwrap().trigger_price,
            Some(Price::from_u64(99))
        );
        assert_eq!(
            pool.pop_eligible(reference).unwrap().trigger_price,
            Some(Price::from_u64(97))
        );
    }

    #[test]
    fn test_same_trigger_pops_in_arrival_order() {
        let mut pool = TriggerPool::new();
        let first = stop(Side::Bid, 100);
        let second = stop(Side::Bid, 100);
        let (first_id, second_id) = (first.id, second.id);
        pool.insert(first);
        pool.insert(second);

        let reference = Price::from_u64(100);
        assert_eq!(pool.pop_eligible(reference).unwrap().id, first_id);
        assert_eq!(pool.pop_eligible(reference).unwrap().id, second_id);
    }

    #[test]
    fn test_remove_waiting_order() {
        let mut pool = TriggerPool::new();
        let order = stop(Side::Bid, 100);
        let order_id = order.id;
        pool.insert(order);

        assert!(pool.contains(order_id));
        let removed = pool.remove(order_id).unwrap();
        assert_eq!(removed.id, order_id);
        assert!(pool.is_empty());
        assert!(pool.pop_eligible(Price::from_u64(200)).is_none());
    }

    #[test]
    fn test_closest_side_wins_when_both_eligible() {
        let mut pool = TriggerPool::new();
        pool.insert(stop(Side::Bid, 99)); // distance 1 from 100
        pool.insert(stop(Side::Ask, 104)); // distance 4 from 100

        let fired = pool.pop_eligible(Price::from_u64(100)).unwrap();
        assert_eq!(fired.side, Side::Bid);
    }
}
