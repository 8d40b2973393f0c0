//! Single-order processing hot path
//!
//! `Matcher::process_place` and `process_cancel` are the only mutation entry
//! points for one instrument's book and depth tracker. Each (order type,
//! time-in-force) combination gets its own specialized path; branching over
//! the combination happens once per command, and the inner level-consuming
//! loop is shared.
//!
//! Trades always execute at the maker's price. Book and depth mutate in the
//! same step, so the tracker never observes a half-applied command.

use thiserror::Error;
use tracing::debug;
use types::errors::RejectReason;
use types::ids::OrderId;
use types::numeric::{quote_value, Price, Quantity};
use types::order::{Order, OrderStatus, OrderType, Side, TimeInForce};
use types::trade::Trade;

use crate::book::{BookError, OrderBook};
use crate::config::{InstrumentConfig, MarketOnEmpty};
use crate::depth::{DepthTracker, DepthView};
use crate::matching::crossing;

/// Errors from the matching paths
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchingError {
    /// Cancel target is not resting in the book
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// Book-level failure; fatal variants poison the instrument
    #[error(transparent)]
    Book(#[from] BookError),
}

/// One observed status transition, in occurrence order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusChange {
    pub order_id: OrderId,
    pub previous: OrderStatus,
    pub current: OrderStatus,
}

/// Everything a single command produced
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Final snapshot of the order the command was about
    pub taker: Order,
    /// Trades in execution order
    pub trades: Vec<Trade>,
    /// Maker snapshots parallel to `trades`
    pub makers: Vec<Order>,
    /// Status transitions in occurrence order
    pub status_changes: Vec<StatusChange>,
    /// True if a remainder was inserted into the book
    pub rested: bool,
    /// Set when validation failed and the order was never placed
    pub reject_reason: Option<RejectReason>,
    /// Set when a stop converted on intake because the reference price had
    /// already crossed its trigger
    pub trigger_fired: Option<Price>,
}

impl ProcessOutcome {
    fn new(taker: Order) -> Self {
        Self {
            taker,
            trades: Vec::new(),
            makers: Vec::new(),
            status_changes: Vec::new(),
            rested: false,
            reject_reason: None,
            trigger_fired: None,
        }
    }

    /// Outcome for a cancellation resolved outside the book (trigger pool)
    pub fn cancelled(order: Order, previous: OrderStatus) -> Self {
        let mut outcome = Self::new(order);
        outcome.status_changes.push(StatusChange {
            order_id: outcome.taker.id,
            previous,
            current: outcome.taker.status,
        });
        outcome
    }
}

/// Matching engine core for one instrument
#[derive(Debug)]
pub struct Matcher {
    config: InstrumentConfig,
    book: OrderBook,
    depth: DepthTracker,
}

impl Matcher {
    pub fn new(config: InstrumentConfig) -> Self {
        let instrument_id = config.instrument_id;
        Self {
            config,
            book: OrderBook::new(instrument_id),
            depth: DepthTracker::new(instrument_id),
        }
    }

    pub fn instrument_id(&self) -> types::ids::InstrumentId {
        self.config.instrument_id
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Snapshot of at most `limit` aggregated levels per side
    pub fn depth_snapshot(&self, limit: usize, timestamp: i64) -> DepthView {
        self.depth.snapshot(limit, timestamp)
    }

    /// Process a place command.
    ///
    /// `reference` is the instrument's current reference price, used to
    /// decide whether an incoming stop fires immediately. Fatal book errors
    /// propagate; everything else is expressed in the outcome.
    pub fn process_place(
        &mut self,
        mut order: Order,
        reference: Option<Price>,
        timestamp: i64,
    ) -> Result<ProcessOutcome, BookError> {
        let mut outcome = ProcessOutcome::new(order.clone());

        if let Some(reason) = self.validate(&order) {
            debug!(order_id = %order.id, %reason, "order rejected");
            let previous = order.status;
            order.reject(timestamp);
            outcome.status_changes.push(StatusChange {
                order_id: order.id,
                previous,
                current: order.status,
            });
            outcome.reject_reason = Some(reason);
            outcome.taker = order;
            return Ok(outcome);
        }

        // Stops that have not fired yet never touch the book
        let mut effective_type = order.order_type;
        if matches!(order.order_type, OrderType::Stop | OrderType::StopLimit) {
            let trigger = order
                .trigger_price
                .expect("validated: stop orders carry a trigger price");
            let fired = match (order.side, reference) {
                (_, None) => false,
                (Side::Bid, Some(r)) => r >= trigger,
                (Side::Ask, Some(r)) => r <= trigger,
            };
            if !fired {
                self.transition(&mut order, OrderStatus::WaitingTrigger, timestamp, &mut outcome);
                outcome.taker = order;
                return Ok(outcome);
            }
            outcome.trigger_fired = reference;
            effective_type = match order.order_type {
                OrderType::Stop => OrderType::Market,
                _ => OrderType::Limit,
            };
        }

        self.transition(&mut order, OrderStatus::New, timestamp, &mut outcome);

        match (effective_type, order.time_in_force) {
            (OrderType::Limit, TimeInForce::GTC) => {
                let limit = order.limit_price.expect("validated: limit price present");
                self.process_limit_gtc(&mut order, limit, timestamp, &mut outcome)?;
            }
            (OrderType::Limit, TimeInForce::IOC) => {
                let limit = order.limit_price.expect("validated: limit price present");
                self.process_limit_ioc(&mut order, limit, timestamp, &mut outcome)?;
            }
            (OrderType::Limit, TimeInForce::FOK) => {
                let limit = order.limit_price.expect("validated: limit price present");
                self.process_limit_fok(&mut order, limit, timestamp, &mut outcome)?;
            }
            (OrderType::Market, _) => {
                self.process_market(&mut order, timestamp, &mut outcome)?;
            }
            // Unfired stops returned above; fired ones were rewritten
            (OrderType::Stop | OrderType::StopLimit, _) => unreachable!("stop orders are rewritten before dispatch"),
        }

        outcome.taker = order;
        Ok(outcome)
    }

    /// Process a cancel command against the book.
    ///
    /// Waiting conditional orders live in the worker's trigger pool and are
    /// cancelled there; this only sees resting orders.
    pub fn process_cancel(
        &mut self,
        order_id: OrderId,
        timestamp: i64,
    ) -> Result<ProcessOutcome, MatchingError> {
        let mut order = match self.book.cancel(order_id) {
            Ok(order) => order,
            Err(BookError::OrderNotFound(id)) => return Err(MatchingError::OrderNotFound(id)),
            Err(e) => return Err(MatchingError::Book(e)),
        };

        let price = order
            .limit_price
            .ok_or(MatchingError::Book(BookError::CorruptIndex(order_id)))?;
        self.depth
            .order_removed(order.side, price, order.remaining_base);

        let previous = order.status;
        order
            .cancel(timestamp)
            .map_err(|e| MatchingError::Book(BookError::Order(e)))?;

        let mut outcome = ProcessOutcome::new(order);
        outcome.status_changes.push(StatusChange {
            order_id,
            previous,
            current: outcome.taker.status,
        });
        Ok(outcome)
    }

    /// Book/depth coherence: tracked volume equals resting order remainders
    /// on both sides. Exercised by tests after every scripted command.
    pub fn is_coherent(&self) -> bool {
        for side in [Side::Bid, Side::Ask] {
            let from_orders = self
                .book
                .iter_orders()
                .filter(|o| o.side == side)
                .fold(Quantity::zero(), |acc, o| acc + o.remaining_base);
            if self.book.side_volume(side) != from_orders {
                return false;
            }
            if self.depth.side_volume(side) != from_orders {
                return false;
            }
        }
        true
    }

    // ── specialized paths ───────────────────────────────────────────

    fn process_limit_gtc(
        &mut self,
        order: &mut Order,
        limit: Price,
        timestamp: i64,
        outcome: &mut ProcessOutcome,
    ) -> Result<(), BookError> {
        self.match_against_book(order, Some(limit), timestamp, outcome)?;
        if !order.is_filled() {
            self.rest(order.clone(), outcome)?;
        }
        Ok(())
    }

    fn process_limit_ioc(
        &mut self,
        order: &mut Order,
        limit: Price,
        timestamp: i64,
        outcome: &mut ProcessOutcome,
    ) -> Result<(), BookError> {
        self.match_against_book(order, Some(limit), timestamp, outcome)?;
        if !order.is_filled() {
            self.cancel_taker(order, timestamp, outcome)?;
        }
        Ok(())
    }

    fn process_limit_fok(
        &mut self,
        order: &mut Order,
        limit: Price,
        timestamp: i64,
        outcome: &mut ProcessOutcome,
    ) -> Result<(), BookError> {
        if !self
            .book
            .check_fok_liquidity(order.side, Some(limit), order.remaining_base)
        {
            self.cancel_taker(order, timestamp, outcome)?;
            return Ok(());
        }
        self.match_against_book(order, Some(limit), timestamp, outcome)?;
        debug_assert!(order.is_filled(), "pre-checked fill-or-kill must fill fully");
        Ok(())
    }

    /// Market orders match at any price and never rest
    fn process_market(
        &mut self,
        order: &mut Order,
        timestamp: i64,
        outcome: &mut ProcessOutcome,
    ) -> Result<(), BookError> {
        if order.time_in_force == TimeInForce::FOK {
            if !self
                .book
                .check_fok_liquidity(order.side, None, order.remaining_base)
            {
                self.cancel_taker(order, timestamp, outcome)?;
                return Ok(());
            }
            self.match_against_book(order, None, timestamp, outcome)?;
            debug_assert!(order.is_filled(), "pre-checked fill-or-kill must fill fully");
            return Ok(());
        }

        self.match_against_book(order, None, timestamp, outcome)?;
        if !order.is_filled() {
            if !order.has_fills() && self.config.market_on_empty == MarketOnEmpty::Reject {
                let previous = order.status;
                order.reject(timestamp);
                outcome.status_changes.push(StatusChange {
                    order_id: order.id,
                    previous,
                    current: order.status,
                });
                outcome.reject_reason = Some(RejectReason::NoLiquidity);
            } else {
                self.cancel_taker(order, timestamp, outcome)?;
            }
        }
        Ok(())
    }

    // ── shared helpers ──────────────────────────────────────────────

    /// Consume opposing levels while the bound crosses, filling head-first.
    fn match_against_book(
        &mut self,
        taker: &mut Order,
        bound: Option<Price>,
        timestamp: i64,
        outcome: &mut ProcessOutcome,
    ) -> Result<(), BookError> {
        while !taker.remaining_base.is_zero() {
            let (maker_id, maker_side, maker_price, maker_remaining, maker_previous) = {
                let Some(maker) = self.book.peek_counter(taker.side) else {
                    break;
                };
                let price = maker
                    .limit_price
                    .ok_or(BookError::CorruptIndex(maker.id))?;
                (maker.id, maker.side, price, maker.remaining_base, maker.status)
            };

            if !crossing::taker_crosses(taker.side, bound, maker_price) {
                break;
            }

            let fill = taker.remaining_base.min(maker_remaining);
            let quote = quote_value(fill, maker_price, self.config.quote_scale);

            let taker_previous = taker.status;
            taker.fill(fill, quote, timestamp)?;
            if taker.status != taker_previous {
                outcome.status_changes.push(StatusChange {
                    order_id: taker.id,
                    previous: taker_previous,
                    current: taker.status,
                });
            }

            let matched = self.book.apply_match(maker_id, fill, quote, timestamp)?;
            self.depth
                .order_matched(maker_side, maker_price, fill, matched.removed);
            if matched.order.status != maker_previous {
                outcome.status_changes.push(StatusChange {
                    order_id: maker_id,
                    previous: maker_previous,
                    current: matched.order.status,
                });
            }

            outcome.trades.push(Trade::new(
                self.config.instrument_id,
                maker_id,
                taker.id,
                fill,
                quote,
                maker_price,
                timestamp,
            ));
            outcome.makers.push(matched.order);
        }
        Ok(())
    }

    /// Insert the unfilled remainder at its limit price
    fn rest(&mut self, order: Order, outcome: &mut ProcessOutcome) -> Result<(), BookError> {
        let side = order.side;
        let price = order.limit_price.ok_or(BookError::MissingLimitPrice)?;
        let remaining = order.remaining_base;
        self.book.add_resting(order)?;
        self.depth.order_added(side, price, remaining);
        outcome.rested = true;
        Ok(())
    }

    /// Kill the unfilled remainder of a taker that will not rest
    fn cancel_taker(
        &mut self,
        order: &mut Order,
        timestamp: i64,
        outcome: &mut ProcessOutcome,
    ) -> Result<(), BookError> {
        let previous = order.status;
        order.cancel(timestamp).map_err(BookError::Order)?;
        outcome.status_changes.push(StatusChange {
            order_id: order.id,
            previous,
            current: order.status,
        });
        Ok(())
    }

    fn transition(
        &self,
        order: &mut Order,
        status: OrderStatus,
        timestamp: i64,
        outcome: &mut ProcessOutcome,
    ) {
        if order.status != status {
            outcome.status_changes.push(StatusChange {
                order_id: order.id,
                previous: order.status,
                current: status,
            });
            order.status = status;
            order.updated_at = timestamp;
        }
    }

    fn validate(&self, order: &Order) -> Option<RejectReason> {
        if order.instrument_id != self.config.instrument_id {
            return Some(RejectReason::InstrumentMismatch);
        }
        if order.base_amount.is_zero() {
            return Some(RejectReason::ZeroBaseAmount);
        }
        if matches!(order.order_type, OrderType::Limit | OrderType::StopLimit)
            && order.limit_price.is_none()
        {
            return Some(RejectReason::MissingLimitPrice);
        }
        if matches!(order.order_type, OrderType::Stop | OrderType::StopLimit)
            && order.trigger_price.is_none()
        {
            return Some(RejectReason::MissingTriggerPrice);
        }
        None
    }
}
