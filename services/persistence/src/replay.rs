//! Event-sourced book reconstruction
//!
//! Rebuilds a single instrument's book by applying the journaled
//! `OrderAdded` / `OrderMatched` / `OrderCancelled` events to a fresh
//! `OrderBook`. Taker-side match events reference orders that never rested;
//! they are skipped, which is exactly what the live book did.

use matching_engine::book::{BookError, OrderBook};
use matching_engine::events::EventPayload;
use thiserror::Error;
use types::ids::InstrumentId;

use crate::journal::JournalRecord;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to decode event payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("replay diverged from the journal: {0}")]
    Book(#[from] BookError),
}

/// Rebuild the resting state of one instrument's book from its journal
pub fn replay_book(
    records: &[JournalRecord],
    instrument_id: InstrumentId,
) -> Result<OrderBook, ReplayError> {
    let mut book = OrderBook::new(instrument_id);

    for record in records {
        if record.instrument_id != instrument_id {
            continue;
        }
        let payload: EventPayload = serde_json::from_value(record.payload.clone())?;
        match payload {
            EventPayload::OrderAdded { order } => {
                book.add_resting(order)?;
            }
            EventPayload::OrderMatched {
                order,
                matched_base,
            } => {
                // Only maker-side events touch resting state
                let Some(current) = book.get(order.id) else {
                    continue;
                };
                let quote_delta = order.filled_quote - current.filled_quote;
                book.apply_match(order.id, matched_base, quote_delta, order.updated_at)?;
            }
            EventPayload::OrderCancelled { order } => {
                if book.get(order.id).is_some() {
                    book.cancel(order.id)?;
                }
            }
            _ => {}
        }
    }

    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matching_engine::config::{EngineConfig, InstrumentConfig};
    use matching_engine::EngineManager;
    use types::ids::AccountId;
    use types::numeric::{Price, Quantity};
    use types::order::{Order, Side, TimeInForce};

    fn limit(instrument_id: InstrumentId, side: Side, price: u64, amount: &str) -> Order {
        Order::limit(
            AccountId::new(),
            instrument_id,
            side,
            Price::from_u64(price),
            Quantity::from_str(amount).unwrap(),
            TimeInForce::GTC,
            1708123456789000000,
        )
    }

    #[test]
    fn test_replay_reconstructs_partial_fill_state() {
        let instrument_id = InstrumentId::new();
        let config = EngineConfig::new(vec![InstrumentConfig::new(instrument_id)]);
        let manager = EngineManager::new(config);
        let mut subscriber = manager.subscribe();

        // Ask 0.5 @100 fills fully; bid 1.0 @101 rests with 0.5 left
        manager.place(limit(instrument_id, Side::Ask, 100, "0.5")).unwrap();
        let bid = manager.place(limit(instrument_id, Side::Bid, 101, "1.0")).unwrap();
        // And an untouched deep ask plus a cancelled order
        let deep = manager.place(limit(instrument_id, Side::Ask, 110, "2.0")).unwrap();
        let gone = manager.place(limit(instrument_id, Side::Bid, 90, "3.0")).unwrap();
        manager.cancel(instrument_id, gone.order.id).unwrap();

        let records: Vec<JournalRecord> = subscriber
            .drain()
            .iter()
            .map(|event| JournalRecord::from_event(event).unwrap())
            .collect();
        manager.stop().unwrap();

        let book = replay_book(&records, instrument_id).unwrap();

        assert_eq!(book.best_bid(), Some(Price::from_u64(101)));
        assert_eq!(book.best_ask(), Some(Price::from_u64(110)));
        assert_eq!(
            book.volume_at(Side::Bid, Price::from_u64(101)),
            Quantity::from_str("0.5").unwrap()
        );
        assert_eq!(
            book.volume_at(Side::Ask, Price::from_u64(110)),
            Quantity::from_str("2.0").unwrap()
        );
        assert_eq!(book.order_count(), 2);

        let rebuilt_bid = book.get(bid.order.id).unwrap();
        assert_eq!(rebuilt_bid.filled_quote, bid.order.filled_quote);
        assert!(book.get(deep.order.id).is_some());
        assert!(book.get(gone.order.id).is_none());
    }

    #[test]
    fn test_replay_ignores_other_instruments() {
        let target = InstrumentId::new();
        let other = InstrumentId::new();
        let config = EngineConfig::new(vec![
            InstrumentConfig::new(target),
            InstrumentConfig::new(other),
        ]);
        let manager = EngineManager::new(config);
        let mut subscriber = manager.subscribe();

        manager.place(limit(target, Side::Bid, 100, "1.0")).unwrap();
        manager.place(limit(other, Side::Bid, 200, "5.0")).unwrap();

        let records: Vec<JournalRecord> = subscriber
            .drain()
            .iter()
            .map(|event| JournalRecord::from_event(event).unwrap())
            .collect();
        manager.stop().unwrap();

        let book = replay_book(&records, target).unwrap();
        assert_eq!(book.order_count(), 1);
        assert_eq!(book.best_bid(), Some(Price::from_u64(100)));
    }
}
