//! Order lifecycle types
//!
//! Defines the canonical order entity, its enums, and the state transitions
//! the matching engine is allowed to apply. Transitions return `Result` so
//! an inconsistent book can be detected and isolated instead of aborting the
//! whole process.

use crate::errors::OrderError;
use crate::ids::{AccountId, InstrumentId, OrderId};
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order
    Bid,
    /// Sell order
    Ask,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// Order type, which selects the matching algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Executes at the limit price or better
    Limit,
    /// Executes immediately at the best available price; never rests
    Market,
    /// Dormant until the reference price crosses the trigger, then a Market
    Stop,
    /// Dormant until triggered, then a Limit at `limit_price`
    StopLimit,
}

/// Time-in-force policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-Till-Cancelled: rests until filled or cancelled
    #[default]
    GTC,
    /// Immediate-Or-Cancel: matches what it can, cancels the remainder
    IOC,
    /// Fill-Or-Kill: fills entirely or cancels without any fill
    FOK,
}

/// Order lifecycle status
///
/// Transitions form a DAG; `Filled`, `Cancelled`, `PartialFillCancelled`
/// and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Received but not yet admitted by the matcher
    PendingNew,
    /// Admitted, not yet matched
    New,
    /// Conditional order waiting for its trigger condition
    WaitingTrigger,
    /// Some base amount filled, remainder still live
    PartiallyFilled,
    /// Completely filled (terminal)
    Filled,
    /// Cancelled with no fills (terminal)
    Cancelled,
    /// Partially filled, then cancelled (terminal)
    PartialFillCancelled,
    /// Failed validation or admission (terminal)
    Rejected,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::PartialFillCancelled
                | OrderStatus::Rejected
        )
    }
}

/// A trading order
///
/// `filled_base + remaining_base == base_amount` holds at every observable
/// moment; `filled_base` and `filled_quote` are monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Optional external identifier provided by the client
    pub client_id: Option<String>,
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub order_type: OrderType,
    /// Required for Limit and StopLimit
    pub limit_price: Option<Price>,
    /// Required for Stop and StopLimit
    pub trigger_price: Option<Price>,
    pub base_amount: Quantity,
    pub remaining_base: Quantity,
    pub filled_base: Quantity,
    pub filled_quote: Decimal,
    pub status: OrderStatus,
    pub time_in_force: TimeInForce,
    pub created_at: i64, // Unix nanos
    pub updated_at: i64, // Unix nanos
}

impl Order {
    /// Create a new order in `PendingNew` status
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: AccountId,
        instrument_id: InstrumentId,
        side: Side,
        order_type: OrderType,
        limit_price: Option<Price>,
        trigger_price: Option<Price>,
        base_amount: Quantity,
        time_in_force: TimeInForce,
        timestamp: i64,
    ) -> Self {
        Self {
            id: OrderId::new(),
            client_id: None,
            account_id,
            instrument_id,
            side,
            order_type,
            limit_price,
            trigger_price,
            base_amount,
            remaining_base: base_amount,
            filled_base: Quantity::zero(),
            filled_quote: Decimal::ZERO,
            status: OrderStatus::PendingNew,
            time_in_force,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Convenience constructor for a limit order
    pub fn limit(
        account_id: AccountId,
        instrument_id: InstrumentId,
        side: Side,
        price: Price,
        base_amount: Quantity,
        time_in_force: TimeInForce,
        timestamp: i64,
    ) -> Self {
        Self::new(
            account_id,
            instrument_id,
            side,
            OrderType::Limit,
            Some(price),
            None,
            base_amount,
            time_in_force,
            timestamp,
        )
    }

    /// Convenience constructor for a market order
    pub fn market(
        account_id: AccountId,
        instrument_id: InstrumentId,
        side: Side,
        base_amount: Quantity,
        timestamp: i64,
    ) -> Self {
        Self::new(
            account_id,
            instrument_id,
            side,
            OrderType::Market,
            None,
            None,
            base_amount,
            TimeInForce::IOC,
            timestamp,
        )
    }

    /// Attach a client-provided external id
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Quantity invariant: filled + remaining == total
    pub fn check_quantity_invariant(&self) -> bool {
        self.filled_base.as_decimal() + self.remaining_base.as_decimal()
            == self.base_amount.as_decimal()
    }

    /// Check if order is completely filled
    pub fn is_filled(&self) -> bool {
        self.remaining_base.is_zero()
    }

    /// Check if order has any fills
    pub fn has_fills(&self) -> bool {
        !self.filled_base.is_zero()
    }

    /// Apply a fill of `base` at `quote` total value and adjust status.
    ///
    /// Fails if the order is terminal, the fill exceeds the remaining
    /// amount, or the quantity invariant would break.
    pub fn fill(&mut self, base: Quantity, quote: Decimal, timestamp: i64) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::AlreadyTerminal {
                order_id: self.id,
                status: self.status,
            });
        }

        let remaining = self
            .remaining_base
            .checked_sub(base)
            .ok_or(OrderError::Overfill {
                order_id: self.id,
                fill: base,
                remaining: self.remaining_base,
            })?;

        self.remaining_base = remaining;
        self.filled_base = self.filled_base + base;
        self.filled_quote += quote;
        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = timestamp;

        if !self.check_quantity_invariant() {
            return Err(OrderError::InvariantViolated { order_id: self.id });
        }
        Ok(())
    }

    /// Cancel the order: `Cancelled` if untouched, `PartialFillCancelled`
    /// if it had fills.
    pub fn cancel(&mut self, timestamp: i64) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::AlreadyTerminal {
                order_id: self.id,
                status: self.status,
            });
        }
        self.status = if self.has_fills() {
            OrderStatus::PartialFillCancelled
        } else {
            OrderStatus::Cancelled
        };
        self.updated_at = timestamp;
        Ok(())
    }

    /// Mark the order rejected
    pub fn reject(&mut self, timestamp: i64) {
        self.status = OrderStatus::Rejected;
        self.updated_at = timestamp;
    }
}
