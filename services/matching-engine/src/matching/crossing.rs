//! Crossing detection
//!
//! Determines when a taker's price bound crosses a resting level's price.

use types::numeric::Price;
use types::order::Side;

/// Check if a bid and ask can match at given prices
pub fn can_match(bid_price: Price, ask_price: Price) -> bool {
    bid_price >= ask_price
}

/// Check whether a taker with an optional price bound crosses a resting
/// level. A bound of None (market order) crosses any level.
pub fn taker_crosses(taker_side: Side, taker_limit: Option<Price>, resting_price: Price) -> bool {
    match (taker_side, taker_limit) {
        (_, None) => true,
        (Side::Bid, Some(limit)) => can_match(limit, resting_price),
        (Side::Ask, Some(limit)) => can_match(resting_price, limit),
    }
}
