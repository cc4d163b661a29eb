//! Clipboard-to-action dictation bridge
//!
//! A dictation engine writes each recognized phrase to the system clipboard.
//! The bridge polls the clipboard, and every new payload becomes exactly one
//! action in the host editor.
//!
//! # Pipeline
//!
//! - **Watcher**: detects new clipboard content against the last snapshot and
//!   ignores content the bridge wrote itself
//! - **Interpreter**: maps a payload to a spoken command or dictated text
//! - **Dispatcher**: performs the action through the [`HostEditor`] port, with
//!   automatic spacing between dictated phrases
//! - **Controller**: start/stop lifecycle and the poll loop
//! - **Status**: per-action outcomes and lifecycle events for a UI
//!
//! [`HostEditor`]: crate::ports::HostEditor

mod commands;
mod controller;
mod dispatcher;
mod snapshot;
mod status;
mod watcher;

pub use commands::{ClipboardKind, Command, CommandInterpreter, CommandKind, EditKind, FileKind};
pub use controller::{BridgeController, BridgeError, BridgeState};
pub use dispatcher::{ActionDispatcher, ActionError};
pub use snapshot::{ClipboardSnapshot, SnapshotStore};
pub use status::{ActionOutcome, BridgeStatus, StatusEvent, StatusReporter};
pub use watcher::{ClipboardChange, ClipboardWatcher};
