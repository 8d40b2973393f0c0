//! Trade types
//!
//! A trade is the atomic exchange between a resting maker order and the
//! taker being processed. The quote amount is `base × price` under the
//! instrument's rounding rule; the engine never emits a zero-amount trade.

use crate::ids::{InstrumentId, OrderId, TradeId};
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A completed trade between two orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub instrument_id: InstrumentId,
    /// The order that was resting on the book at the moment of match
    pub maker_order_id: OrderId,
    /// The order being processed
    pub taker_order_id: OrderId,
    /// Traded amount in base units
    pub base_amount: Quantity,
    /// Traded amount in quote units (`base × price`, rounded)
    pub quote_amount: Decimal,
    /// Execution price (the maker's price)
    pub price: Price,
    pub created_at: i64, // Unix nanos
}

impl Trade {
    pub fn new(
        instrument_id: InstrumentId,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        base_amount: Quantity,
        quote_amount: Decimal,
        price: Price,
        created_at: i64,
    ) -> Self {
        Self {
            id: TradeId::new(),
            instrument_id,
            maker_order_id,
            taker_order_id,
            base_amount,
            quote_amount,
            price,
            created_at,
        }
    }

    /// Exact trade value before rounding (`base × price`)
    pub fn exact_value(&self) -> Decimal {
        self.base_amount.as_decimal() * self.price.as_decimal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_creation() {
        let trade = Trade::new(
            InstrumentId::new(),
            OrderId::new(),
            OrderId::new(),
            Quantity::from_str("0.5").unwrap(),
            dec!(25000.25),
            Price::from_str("50000.50").unwrap(),
            1708123456789000000,
        );

        assert_eq!(trade.base_amount, Quantity::from_str("0.5").unwrap());
        assert_eq!(trade.quote_amount, dec!(25000.25));
        assert_eq!(trade.exact_value(), dec!(25000.250));
    }

    #[test]
    fn test_trade_ids_unique() {
        let instrument = InstrumentId::new();
        let make = || {
            Trade::new(
                instrument,
                OrderId::new(),
                OrderId::new(),
                Quantity::from_u64(1),
                dec!(100),
                Price::from_u64(100),
                0,
            )
        };
        assert_ne!(make().id, make().id);
    }

    #[test]
    fn test_trade_serialization() {
        let trade = Trade::new(
            InstrumentId::new(),
            OrderId::new(),
            OrderId::new(),
            Quantity::from_str("0.5").unwrap(),
            dec!(25000),
            Price::from_u64(50000),
            1708123456789000000,
        );

        let json = serde_json::to_string(&trade).unwrap();
        let deserialized: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deserialized);
    }
}
