//! Last-observed clipboard payload

use chrono::{DateTime, Utc};

/// One accepted clipboard payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    payload: String,
    sequence: u64,
    observed_at: DateTime<Utc>,
}

impl ClipboardSnapshot {
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// Holds exactly one current snapshot; the sequence only moves forward
#[derive(Debug)]
pub struct SnapshotStore {
    current: ClipboardSnapshot,
}

impl SnapshotStore {
    /// Seed the store with a baseline payload at sequence 0
    pub fn new(baseline: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            current: ClipboardSnapshot {
                payload: baseline.into(),
                sequence: 0,
                observed_at: now,
            },
        }
    }

    pub fn read(&self) -> &ClipboardSnapshot {
        &self.current
    }

    /// Replace the current snapshot if `payload` differs from it
    pub fn try_accept(&mut self, payload: &str, now: DateTime<Utc>) -> Option<ClipboardSnapshot> {
        if payload == self.current.payload {
            return None;
        }

        self.current = ClipboardSnapshot {
            payload: payload.to_string(),
            sequence: self.current.sequence + 1,
            observed_at: now,
        };
        Some(self.current.clone())
    }
}
