//! Clipboard change detection
//!
//! Each poll reads the clipboard once and offers the text to the snapshot
//! store. Only payloads the store accepts, and that the bridge did not write
//! itself, come out as [`ClipboardChange`]s.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::snapshot::{ClipboardSnapshot, SnapshotStore};
use crate::ports::ClipboardPort;

/// New external clipboard content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardChange {
    pub payload: String,
    pub sequence: u64,
}

pub struct ClipboardWatcher {
    store: SnapshotStore,
    /// Last payload the dispatcher put on the clipboard
    self_written: Option<String>,
    /// The bridge wrote to the clipboard but could not read back what
    self_write_pending: bool,
    /// Set while reads keep failing, so a failure streak logs once
    read_failing: bool,
    failed_reads: u64,
}

impl ClipboardWatcher {
    pub fn new(baseline: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            store: SnapshotStore::new(baseline, now),
            self_written: None,
            self_write_pending: false,
            read_failing: false,
            failed_reads: 0,
        }
    }

    /// Start from whatever the clipboard holds right now.
    /// An unreadable clipboard gives an empty baseline.
    pub fn from_clipboard(clipboard: &mut dyn ClipboardPort, now: DateTime<Utc>) -> Self {
        let baseline = match clipboard.read_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("could not read clipboard baseline: {}", e);
                String::new()
            }
        };
        Self::new(baseline, now)
    }

    /// Read the clipboard once and report genuinely new content
    pub fn poll(
        &mut self,
        clipboard: &mut dyn ClipboardPort,
        now: DateTime<Utc>,
    ) -> Option<ClipboardChange> {
        let payload = match clipboard.read_text() {
            Ok(text) => {
                if self.read_failing {
                    debug!("clipboard readable again");
                    self.read_failing = false;
                }
                text
            }
            Err(e) => {
                self.failed_reads += 1;
                if !self.read_failing {
                    warn!("clipboard read failed, retrying next tick: {}", e);
                    self.read_failing = true;
                }
                return None;
            }
        };

        let snapshot = self.store.try_accept(&payload, now)?;

        if self.self_write_pending {
            self.self_write_pending = false;
            debug!(
                sequence = snapshot.sequence(),
                "recording unconfirmed clipboard write by the bridge"
            );
            self.self_written = Some(payload);
            return None;
        }

        if self.self_written.as_deref() == Some(payload.as_str()) {
            info!(
                sequence = snapshot.sequence(),
                "ignoring clipboard content identical to an earlier cut or copy"
            );
            return None;
        }

        debug!(
            sequence = snapshot.sequence(),
            chars = payload.chars().count(),
            "new clipboard content"
        );
        Some(ClipboardChange {
            payload,
            sequence: snapshot.sequence(),
        })
    }

    /// Mark `payload` as written by the bridge.
    ///
    /// Must be called before the writing action returns, so the next poll
    /// sees it as unchanged rather than as dictation.
    pub fn record_self_write(&mut self, payload: &str, now: DateTime<Utc>) {
        self.store.try_accept(payload, now);
        self.self_written = Some(payload.to_string());
        self.self_write_pending = false;
    }

    /// The bridge changed the clipboard but the new content is unknown.
    /// The next new content is taken as that write instead of as dictation.
    pub fn expect_self_write(&mut self) {
        self.self_write_pending = true;
    }

    pub fn snapshot(&self) -> &ClipboardSnapshot {
        self.store.read()
    }

    pub fn failed_reads(&self) -> u64 {
        self.failed_reads
    }
}
