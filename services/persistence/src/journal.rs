//! Append-only event journal
//!
//! One line-delimited JSON record per engine event, with fields
//! `{sequence, instrument_id, kind, timestamp, payload, checksum}`.
//! The checksum is CRC32C over `(sequence ++ timestamp ++ kind ++ payload)`
//! and is verified on read, so a torn or corrupted line is detected instead
//! of silently replayed.

use crc32c::crc32c;
use matching_engine::events::EngineEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use types::ids::InstrumentId;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("checksum mismatch on record with sequence {sequence}")]
    ChecksumMismatch { sequence: u64 },
}

/// One persisted event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub sequence: u64,
    pub instrument_id: InstrumentId,
    pub kind: String,
    pub timestamp: i64,
    /// The event payload as tagged JSON
    pub payload: Value,
    /// CRC32C over (sequence ++ timestamp ++ kind ++ payload)
    pub checksum: u32,
}

impl JournalRecord {
    /// Build a record from an engine event, computing the checksum
    pub fn from_event(event: &EngineEvent) -> Result<Self, JournalError> {
        let payload = serde_json::to_value(&event.payload)?;
        let kind = event.kind().to_string();
        let checksum = Self::compute_checksum(event.sequence, event.timestamp, &kind, &payload)?;
        Ok(Self {
            sequence: event.sequence,
            instrument_id: event.instrument_id,
            kind,
            timestamp: event.timestamp,
            payload,
            checksum,
        })
    }

    fn compute_checksum(
        sequence: u64,
        timestamp: i64,
        kind: &str,
        payload: &Value,
    ) -> Result<u32, JournalError> {
        let payload_bytes = serde_json::to_vec(payload)?;
        let mut buf = Vec::with_capacity(8 + 8 + kind.len() + payload_bytes.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(kind.as_bytes());
        buf.extend_from_slice(&payload_bytes);
        Ok(crc32c(&buf))
    }

    /// Recompute and compare the stored checksum
    pub fn verify_checksum(&self) -> Result<bool, JournalError> {
        let expected =
            Self::compute_checksum(self.sequence, self.timestamp, &self.kind, &self.payload)?;
        Ok(self.checksum == expected)
    }
}

/// Appends engine events to a journal file, one JSON line per event
pub struct JournalWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    records_written: u64,
}

impl JournalWriter {
    /// Open (or create) a journal for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            records_written: 0,
        })
    }

    /// Append one event as a line-delimited record
    pub fn append(&mut self, event: &EngineEvent) -> Result<(), JournalError> {
        let record = JournalRecord::from_event(event)?;
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.records_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

/// Reads a journal back, verifying checksums
pub struct JournalReader {
    reader: BufReader<File>,
}

impl JournalReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }

    /// Read every record, failing on the first corrupt line
    pub fn read_all(mut self) -> Result<Vec<JournalRecord>, JournalError> {
        let mut records = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                break;
            }
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            let record: JournalRecord = serde_json::from_str(trimmed)?;
            if !record.verify_checksum()? {
                return Err(JournalError::ChecksumMismatch {
                    sequence: record.sequence,
                });
            }
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matching_engine::events::EventPayload;

    fn event(sequence: u64, instrument_id: InstrumentId) -> EngineEvent {
        EngineEvent {
            sequence,
            instrument_id,
            timestamp: 1708123456789000000 + sequence as i64,
            payload: EventPayload::BookResumed,
        }
    }

    #[test]
    fn test_record_checksum_roundtrip() {
        let record = JournalRecord::from_event(&event(1, InstrumentId::new())).unwrap();
        assert!(record.verify_checksum().unwrap());
    }

    #[test]
    fn test_tampered_record_detected() {
        let mut record = JournalRecord::from_event(&event(1, InstrumentId::new())).unwrap();
        record.timestamp += 1;
        assert!(!record.verify_checksum().unwrap());
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.journal");
        let instrument = InstrumentId::new();

        let mut writer = JournalWriter::open(&path).unwrap();
        for sequence in 1..=5 {
            writer.append(&event(sequence, instrument)).unwrap();
        }
        writer.flush().unwrap();
        assert_eq!(writer.records_written(), 5);

        let records = JournalReader::open(&path).unwrap().read_all().unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].sequence, 1);
        assert_eq!(records[4].sequence, 5);
        assert_eq!(records[0].kind, "BookResumed");
        assert_eq!(records[0].instrument_id, instrument);
    }

    #[test]
    fn test_corrupt_line_fails_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.journal");

        let mut writer = JournalWriter::open(&path).unwrap();
        writer.append(&event(1, InstrumentId::new())).unwrap();
        writer.flush().unwrap();

        // Flip the stored checksum on disk
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut record: JournalRecord = serde_json::from_str(contents.trim()).unwrap();
        record.checksum ^= 0xFFFF;
        std::fs::write(&path, format!("{}\n", serde_json::to_string(&record).unwrap())).unwrap();

        let result = JournalReader::open(&path).unwrap().read_all();
        assert!(matches!(
            result,
            Err(JournalError::ChecksumMismatch { sequence: 1 })
        ));
    }
}
