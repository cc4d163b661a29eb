//! Bridge lifecycle and the poll loop
//!
//! The controller owns the editor and clipboard capabilities for its whole
//! life. `start` builds a fresh watcher/interpreter/dispatcher session and
//! spawns the poll loop; `stop` cancels the loop, waits for a tick that is
//! already running, and drops the session.
//!
//! A tick holds the pipeline lock from clipboard read to finished edit, so
//! ticks never overlap with each other or with `start`/`stop`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::commands::CommandInterpreter;
use super::dispatcher::ActionDispatcher;
use super::status::{ActionOutcome, BridgeStatus, StatusEvent, StatusReporter};
use super::watcher::ClipboardWatcher;
use crate::config::BridgeConfig;
use crate::ports::{ClipboardPort, HostEditor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Stopped,
    Running,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeState::Stopped => write!(f, "stopped"),
            BridgeState::Running => write!(f, "running"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Per-run pipeline stages; present only while running
struct Session {
    watcher: ClipboardWatcher,
    interpreter: CommandInterpreter,
    dispatcher: ActionDispatcher,
}

struct Pipeline {
    editor: Box<dyn HostEditor + Send>,
    clipboard: Box<dyn ClipboardPort + Send>,
    session: Option<Session>,
}

impl Pipeline {
    /// One poll, classify, dispatch pass. `None` when nothing changed.
    fn tick(&mut self, now: DateTime<Utc>) -> Option<ActionOutcome> {
        let session = self.session.as_mut()?;
        let change = session.watcher.poll(self.clipboard.as_mut(), now)?;
        let command = session.interpreter.classify(&change.payload);

        let result = session.dispatcher.dispatch(
            &command,
            self.editor.as_mut(),
            self.clipboard.as_mut(),
            &mut session.watcher,
            now,
        );

        let (detail, error) = match result {
            Ok(detail) => (detail, None),
            Err(e) => (command.to_string(), Some(e.to_string())),
        };
        Some(ActionOutcome {
            sequence: change.sequence,
            kind: command.kind(),
            detail,
            error,
            at: now,
        })
    }
}

struct PollLoop {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct BridgeController {
    state: BridgeState,
    config: Option<BridgeConfig>,
    pipeline: Arc<Mutex<Pipeline>>,
    poll_loop: Option<PollLoop>,
    status: StatusReporter,
}

impl BridgeController {
    pub fn new<E, C>(editor: E, clipboard: C) -> Self
    where
        E: HostEditor + Send + 'static,
        C: ClipboardPort + Send + 'static,
    {
        Self {
            state: BridgeState::Stopped,
            config: None,
            pipeline: Arc::new(Mutex::new(Pipeline {
                editor: Box::new(editor),
                clipboard: Box::new(clipboard),
                session: None,
            })),
            poll_loop: None,
            status: StatusReporter::new(),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Configuration of the current run, `None` while stopped
    pub fn config(&self) -> Option<&BridgeConfig> {
        self.config.as_ref()
    }

    /// Begin monitoring the clipboard. Must be called within a tokio runtime.
    ///
    /// A no-op while already running. An invalid config leaves the bridge stopped.
    pub async fn start(&mut self, config: BridgeConfig) -> Result<(), BridgeError> {
        if self.state == BridgeState::Running {
            debug!("start requested while running, ignoring");
            return Ok(());
        }
        config.validate()?;

        {
            let mut pipeline = self.pipeline.lock().await;
            // Whatever is on the clipboard already was not dictated to us
            let watcher = ClipboardWatcher::from_clipboard(pipeline.clipboard.as_mut(), Utc::now());
            pipeline.session = Some(Session {
                watcher,
                interpreter: CommandInterpreter::new(),
                dispatcher: ActionDispatcher::new(config.auto_space),
            });
        }

        self.status.set_notifications(config.status_notifications);

        let (cancel, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run_poll_loop(
            Arc::clone(&self.pipeline),
            self.status.clone(),
            config.poll_interval(),
            cancel_rx,
        ));
        self.poll_loop = Some(PollLoop { cancel, handle });
        self.config = Some(config);
        self.state = BridgeState::Running;

        info!(
            poll_interval_ms = config.poll_interval_ms,
            auto_space = config.auto_space,
            "bridge started"
        );
        self.status.lifecycle(
            StatusEvent::Started,
            "Clipboard monitoring started - dictate and transfer.",
        );
        Ok(())
    }

    /// Stop monitoring. A tick already in progress finishes first.
    pub async fn stop(&mut self) {
        if self.state == BridgeState::Stopped {
            debug!("stop requested while stopped, ignoring");
            return;
        }

        if let Some(poll_loop) = self.poll_loop.take() {
            let _ = poll_loop.cancel.send(true);
            if let Err(e) = poll_loop.handle.await {
                warn!("poll loop ended abnormally: {}", e);
            }
        }

        self.pipeline.lock().await.session = None;
        self.config = None;
        self.state = BridgeState::Stopped;

        info!("bridge stopped");
        self.status
            .lifecycle(StatusEvent::Stopped, "Clipboard monitoring stopped.");
    }

    /// Run one tick immediately, outside the timer. `None` while stopped or
    /// when the clipboard has not changed.
    pub async fn tick_now(&self) -> Option<ActionOutcome> {
        if self.state == BridgeState::Stopped {
            return None;
        }
        run_tick(&self.pipeline, &self.status).await
    }

    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            state: self.state,
            last_outcome: self.status.last_outcome(),
            accepted_changes: self.status.accepted_changes(),
        }
    }

    /// Most recent outcomes, oldest first
    pub fn recent_outcomes(&self) -> Vec<ActionOutcome> {
        self.status.recent_outcomes()
    }

    /// Stream of lifecycle events and action outcomes
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status.subscribe()
    }
}

impl Drop for BridgeController {
    fn drop(&mut self) {
        if let Some(poll_loop) = self.poll_loop.take() {
            let _ = poll_loop.cancel.send(true);
            poll_loop.handle.abort();
        }
    }
}

async fn run_poll_loop(
    pipeline: Arc<Mutex<Pipeline>>,
    status: StatusReporter,
    period: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    // First poll one period after start; the baseline was read by start
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = interval.tick() => {}
        }
        if *cancel.borrow() {
            break;
        }
        run_tick(&pipeline, &status).await;
    }

    debug!("poll loop exited");
}

/// Run a tick on the blocking pool; host and clipboard calls may block
async fn run_tick(pipeline: &Arc<Mutex<Pipeline>>, status: &StatusReporter) -> Option<ActionOutcome> {
    let mut guard = Arc::clone(pipeline).lock_owned().await;
    let outcome = match tokio::task::spawn_blocking(move || guard.tick(Utc::now())).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("tick did not complete: {}", e);
            None
        }
    };

    if let Some(outcome) = &outcome {
        status.record(outcome.clone());
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::commands::CommandKind;
    use crate::editor::{MemoryClipboard, MemoryDocument};

    fn bridge(clipboard_text: &str) -> (BridgeController, MemoryDocument, MemoryClipboard) {
        let clipboard = MemoryClipboard::with_text(clipboard_text);
        let doc = MemoryDocument::new(clipboard.clone());
        let controller = BridgeController::new(doc.clone(), clipboard.clone());
        (controller, doc, clipboard)
    }

    fn config(poll_interval_ms: u64) -> BridgeConfig {
        BridgeConfig {
            poll_interval_ms,
            ..BridgeConfig::default()
        }
    }

    fn drain(events: &mut broadcast::Receiver<StatusEvent>) -> Vec<StatusEvent> {
        std::iter::from_fn(|| events.try_recv().ok()).collect()
    }

    fn count(events: &mut broadcast::Receiver<StatusEvent>, wanted: &StatusEvent) -> usize {
        drain(events).iter().filter(|e| *e == wanted).count()
    }

    #[tokio::test]
    async fn test_created_stopped_and_ignores_clipboard() {
        let (controller, doc, clipboard) = bridge("");
        assert_eq!(controller.state(), BridgeState::Stopped);

        clipboard.set("hello");
        assert!(controller.tick_now().await.is_none());
        assert_eq!(doc.text(), "");
        assert_eq!(doc.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_stays_stopped() {
        let (mut controller, _doc, _clipboard) = bridge("");
        let mut events = controller.subscribe();

        let result = controller.start(config(0)).await;
        assert!(matches!(result, Err(BridgeError::InvalidConfig(_))));
        assert_eq!(controller.state(), BridgeState::Stopped);
        assert!(controller.config().is_none());
        assert_eq!(count(&mut events, &StatusEvent::Started), 0);
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let (mut controller, _doc, _clipboard) = bridge("");
        let mut events = controller.subscribe();

        controller.start(config(60_000)).await.unwrap();
        controller.start(config(60_000)).await.unwrap();
        assert_eq!(controller.state(), BridgeState::Running);

        controller.stop().await;
        controller.stop().await;
        assert_eq!(controller.state(), BridgeState::Stopped);

        let events = drain(&mut events);
        let started = events.iter().filter(|e| **e == StatusEvent::Started).count();
        let stopped = events.iter().filter(|e| **e == StatusEvent::Stopped).count();
        assert_eq!(started, 1);
        assert_eq!(stopped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_does_not_add_a_poll_loop() {
        let (mut controller, _doc, clipboard) = bridge("");
        controller.start(config(100)).await.unwrap();
        controller.start(config(100)).await.unwrap();
        let baseline_reads = clipboard.reads();

        tokio::time::sleep(Duration::from_millis(1050)).await;

        // One loop polls ten times in a second; two would double that
        let polls = clipboard.reads() - baseline_reads;
        assert!((9..=11).contains(&polls), "polled {} times", polls);
        controller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_dispatches_new_content() {
        let (mut controller, doc, clipboard) = bridge("old content");
        controller.start(config(100)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(doc.text(), "");

        clipboard.set("hello");
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(doc.text(), "hello");

        let status = controller.status();
        assert_eq!(status.state, BridgeState::Running);
        assert_eq!(status.accepted_changes, 1);
        assert_eq!(status.last_outcome.unwrap().kind, CommandKind::Literal);
        controller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_polling_after_stop() {
        let (mut controller, doc, clipboard) = bridge("");
        controller.start(config(100)).await.unwrap();
        controller.stop().await;
        let reads = clipboard.reads();

        clipboard.set("too late");
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(clipboard.reads(), reads);
        assert!(controller.tick_now().await.is_none());
        assert_eq!(doc.text(), "");
    }

    #[tokio::test]
    async fn test_restart_takes_a_new_baseline() {
        let (mut controller, doc, clipboard) = bridge("");
        controller.start(config(60_000)).await.unwrap();
        controller.stop().await;

        clipboard.set("copied while stopped");
        controller.start(config(60_000)).await.unwrap();
        assert!(controller.tick_now().await.is_none());
        assert_eq!(doc.text(), "");
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_config_is_fixed_for_the_run() {
        let (mut controller, doc, clipboard) = bridge("");
        doc.clone().insert_text("Word").unwrap();

        let no_space = BridgeConfig {
            auto_space: false,
            ..config(60_000)
        };
        controller.start(no_space).await.unwrap();
        // Ignored: already running with the first config
        controller.start(config(60_000)).await.unwrap();
        assert_eq!(controller.config(), Some(&no_space));

        clipboard.set("s");
        controller.tick_now().await.unwrap();
        assert_eq!(doc.text(), "Words");
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_host_failure_is_reported_and_polling_continues() {
        let (mut controller, doc, clipboard) = bridge("");
        let mut events = controller.subscribe();
        controller.start(config(60_000)).await.unwrap();

        doc.fail_next(crate::ports::HostError::NoFocus);
        clipboard.set("lost");
        let outcome = controller.tick_now().await.unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.error.as_deref(), Some("editor does not have focus"));

        clipboard.set("kept");
        let outcome = controller.tick_now().await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(doc.text(), "kept");

        let notices = drain(&mut events)
            .into_iter()
            .filter(|e| matches!(e, StatusEvent::Notice(n) if n.contains("focus")))
            .count();
        assert_eq!(notices, 1);
        controller.stop().await;
    }
}
