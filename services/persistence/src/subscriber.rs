//! Journal subscriber
//!
//! Drains an engine event subscription on its own thread and appends every
//! event to a journal. Lag sentinels are journaled too: a gap in the stream
//! is itself worth persisting. The thread exits when the bus is dropped and
//! the buffer is drained.

use std::thread::{self, JoinHandle};

use matching_engine::bus::EventSubscriber;
use matching_engine::events::EventPayload;
use tracing::{error, info, warn};

use crate::journal::JournalWriter;

/// Counters reported when the journal thread exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalStats {
    pub events_written: u64,
    pub lag_incidents: u64,
    pub events_dropped: u64,
    pub write_errors: u64,
}

/// Spawn the journal thread; join the handle to collect final stats
pub fn spawn_journal(
    mut subscriber: EventSubscriber,
    mut writer: JournalWriter,
) -> JoinHandle<JournalStats> {
    thread::Builder::new()
        .name("event-journal".to_string())
        .spawn(move || {
            let mut stats = JournalStats::default();
            while let Some(event) = subscriber.blocking_recv() {
                if let EventPayload::SubscriberLagged { missed } = event.payload {
                    warn!(missed, "journal subscriber lagged; events dropped");
                    stats.lag_incidents += 1;
                    stats.events_dropped += missed;
                }
                match writer.append(&event) {
                    Ok(()) => stats.events_written += 1,
                    Err(e) => {
                        error!(error = %e, "failed to journal event");
                        stats.write_errors += 1;
                    }
                }
            }
            if let Err(e) = writer.flush() {
                error!(error = %e, "failed to flush journal");
                stats.write_errors += 1;
            }
            info!(
                events = stats.events_written,
                dropped = stats.events_dropped,
                "journal thread exiting"
            );
            stats
        })
        .expect("failed to spawn journal thread")
}
