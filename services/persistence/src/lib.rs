//! Persistence collaborators for the matching engine
//!
//! The engine's event bus is its only durability surface; this crate
//! consumes it. `journal` appends line-delimited checksummed records,
//! `subscriber` runs the journaling thread, and `replay` rebuilds a book
//! from the journaled stream.

pub mod journal;
pub mod replay;
pub mod subscriber;

pub use journal::{JournalError, JournalReader, JournalRecord, JournalWriter};
pub use replay::{replay_book, ReplayError};
pub use subscriber::{spawn_journal, JournalStats};
