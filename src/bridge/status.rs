//! Status surface for the UI: per-action outcomes and lifecycle events

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::commands::CommandKind;
use super::controller::BridgeState;

/// Number of outcomes kept for `recent_outcomes`
const RECENT_CAPACITY: usize = 32;
/// Events buffered per subscriber; a lagging subscriber loses the oldest
const EVENT_CAPACITY: usize = 256;

/// Result of dispatching one clipboard change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Snapshot sequence of the clipboard change that caused it
    pub sequence: u64,
    pub kind: CommandKind,
    /// Short description of what happened
    pub detail: String,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Started,
    Stopped,
    Action(ActionOutcome),
    /// Human-readable message, only sent with notifications enabled
    Notice(String),
}

/// Point-in-time view of the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStatus {
    pub state: BridgeState,
    pub last_outcome: Option<ActionOutcome>,
    /// Clipboard changes dispatched since the bridge was created
    pub accepted_changes: u64,
}

struct StatusLog {
    recent: VecDeque<ActionOutcome>,
    accepted_changes: u64,
    notifications: bool,
}

/// Shared sink for outcomes; cheap to clone into the poll loop
#[derive(Clone)]
pub struct StatusReporter {
    log: Arc<Mutex<StatusLog>>,
    tx: broadcast::Sender<StatusEvent>,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            log: Arc::new(Mutex::new(StatusLog {
                recent: VecDeque::with_capacity(RECENT_CAPACITY),
                accepted_changes: 0,
                notifications: true,
            })),
            tx,
        }
    }

    /// Every subscriber gets its own copy of events sent after it subscribed
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    pub fn set_notifications(&self, enabled: bool) {
        self.lock().notifications = enabled;
    }

    pub fn record(&self, outcome: ActionOutcome) {
        match &outcome.error {
            None => info!(
                sequence = outcome.sequence,
                kind = %outcome.kind,
                "{}",
                outcome.detail
            ),
            Some(error) => warn!(
                sequence = outcome.sequence,
                kind = %outcome.kind,
                "{} failed: {}",
                outcome.detail,
                error
            ),
        }

        let notify_failure = {
            let mut log = self.lock();
            if log.recent.len() >= RECENT_CAPACITY {
                log.recent.pop_front();
            }
            log.recent.push_back(outcome.clone());
            log.accepted_changes += 1;
            log.notifications && !outcome.is_success()
        };

        let failure = outcome
            .error
            .as_ref()
            .map(|e| format!("{} failed: {}", outcome.detail, e));
        self.send(StatusEvent::Action(outcome));
        if notify_failure {
            if let Some(message) = failure {
                self.send(StatusEvent::Notice(message));
            }
        }
    }

    /// Lifecycle event, plus a notice if notifications are on
    pub fn lifecycle(&self, event: StatusEvent, notice: &str) {
        info!("{}", notice);
        let notifications = self.lock().notifications;
        self.send(event);
        if notifications {
            self.send(StatusEvent::Notice(notice.to_string()));
        }
    }

    pub fn last_outcome(&self) -> Option<ActionOutcome> {
        self.lock().recent.back().cloned()
    }

    pub fn recent_outcomes(&self) -> Vec<ActionOutcome> {
        self.lock().recent.iter().cloned().collect()
    }

    pub fn accepted_changes(&self) -> u64 {
        self.lock().accepted_changes
    }

    fn send(&self, event: StatusEvent) {
        // No subscribers is fine; the log above keeps the history
        let _ = self.tx.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, StatusLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
