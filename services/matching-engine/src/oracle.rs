//! Reference price sources
//!
//! The reference price drives stop-trigger evaluation. By default a worker
//! uses the instrument's last-trade price, which it tracks itself; a
//! collaborator can supply an alternative source per instrument, consulted
//! once per command completion.

use types::ids::InstrumentId;
use types::numeric::Price;

/// Pluggable source of the reference price for one or more instruments
pub trait ReferencePriceSource: Send + Sync {
    /// Current reference price, or None when no reference exists yet
    fn reference_price(&self, instrument_id: InstrumentId) -> Option<Price>;
}

/// A fixed reference price, mainly for tests and pinned markets
#[derive(Debug, Clone, Copy)]
pub struct FixedReference(pub Price);

impl ReferencePriceSource for FixedReference {
    fn reference_price(&self, _instrument_id: InstrumentId) -> Option<Price> {
        Some(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_reference() {
        let source = FixedReference(Price::from_u64(100));
        assert_eq!(
            source.reference_price(InstrumentId::new()),
            Some(Price::from_u64(100))
        );
    }
}
