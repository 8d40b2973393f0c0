//! Error taxonomy shared across the workspace
//!
//! Order-level transition errors and validation reject reasons live here;
//! book and engine layers define their own error enums on top.

use crate::ids::OrderId;
use crate::numeric::Quantity;
use crate::order::OrderStatus;
use thiserror::Error;

/// Errors from order state transitions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("order {order_id} is already terminal ({status:?})")]
    AlreadyTerminal {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("fill of {fill} exceeds remaining {remaining} on order {order_id}")]
    Overfill {
        order_id: OrderId,
        fill: Quantity,
        remaining: Quantity,
    },

    #[error("quantity invariant violated on order {order_id}")]
    InvariantViolated { order_id: OrderId },
}

/// Why an order failed validation and was never placed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    #[error("base amount must be positive")]
    ZeroBaseAmount,

    #[error("limit order requires a limit price")]
    MissingLimitPrice,

    #[error("stop order requires a trigger price")]
    MissingTriggerPrice,

    #[error("order instrument does not match the book")]
    InstrumentMismatch,

    #[error("no liquidity available for market order")]
    NoLiquidity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_display() {
        assert_eq!(
            RejectReason::ZeroBaseAmount.to_string(),
            "base amount must be positive"
        );
        assert_eq!(
            RejectReason::MissingLimitPrice.to_string(),
            "limit order requires a limit price"
        );
    }

    #[test]
    fn test_reject_reason_serialization() {
        let json = serde_json::to_string(&RejectReason::NoLiquidity).unwrap();
        assert_eq!(json, "\"NO_LIQUIDITY\"");
        let back: RejectReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RejectReason::NoLiquidity);
    }

    #[test]
    fn test_order_error_display() {
        let err = OrderError::Overfill {
            order_id: OrderId::new(),
            fill: Quantity::from_u64(2),
            remaining: Quantity::from_u64(1),
        };
        assert!(err.to_string().contains("exceeds remaining"));
    }
}
