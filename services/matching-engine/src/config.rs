//! Engine configuration
//!
//! Per-instrument declarations (scales, market-on-empty policy) plus the
//! engine-wide tunables for queues, the event bus, and command timeouts.

use serde::{Deserialize, Serialize};
use types::ids::InstrumentId;

/// What happens to a market order when the opposite side is empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketOnEmpty {
    /// Cancel the taker with no trades
    #[default]
    Cancel,
    /// Reject the taker with a no-liquidity reason
    Reject,
}

/// Declaration of one tradable instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub instrument_id: InstrumentId,
    /// Decimal places for quote amounts; trade values round half-away-from-zero here
    pub quote_scale: u32,
    /// Policy for market orders against an empty opposite side
    #[serde(default)]
    pub market_on_empty: MarketOnEmpty,
}

impl InstrumentConfig {
    pub fn new(instrument_id: InstrumentId) -> Self {
        Self {
            instrument_id,
            quote_scale: 8,
            market_on_empty: MarketOnEmpty::Cancel,
        }
    }

    pub fn with_quote_scale(mut self, quote_scale: u32) -> Self {
        self.quote_scale = quote_scale;
        self
    }

    pub fn with_market_on_empty(mut self, policy: MarketOnEmpty) -> Self {
        self.market_on_empty = policy;
        self
    }
}

/// Engine-wide tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub instruments: Vec<InstrumentConfig>,
    /// Bounded capacity of each worker's command queue
    pub command_queue_capacity: usize,
    /// Buffered capacity of the event bus per subscriber
    pub event_bus_capacity: usize,
    /// Levels per side in coalesced depth events and default snapshots
    pub depth_levels: usize,
    /// Default timeout for command submission, in milliseconds
    pub submit_timeout_ms: u64,
}

impl EngineConfig {
    pub fn new(instruments: Vec<InstrumentConfig>) -> Self {
        Self {
            instruments,
            command_queue_capacity: 1024,
            event_bus_capacity: 4096,
            depth_levels: 20,
            submit_timeout_ms: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_config_defaults() {
        let config = InstrumentConfig::new(InstrumentId::new());
        assert_eq!(config.quote_scale, 8);
        assert_eq!(config.market_on_empty, MarketOnEmpty::Cancel);
    }

    #[test]
    fn test_instrument_config_builders() {
        let config = InstrumentConfig::new(InstrumentId::new())
            .with_quote_scale(2)
            .with_market_on_empty(MarketOnEmpty::Reject);
        assert_eq!(config.quote_scale, 2);
        assert_eq!(config.market_on_empty, MarketOnEmpty::Reject);
    }

    #[test]
    fn test_market_on_empty_default_from_json() {
        let json = format!(
            "{{\"instrument_id\":\"{}\",\"quote_scale\":8}}",
            InstrumentId::new()
        );
        let config: InstrumentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.market_on_empty, MarketOnEmpty::Cancel);
    }
}
