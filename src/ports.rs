//! Capabilities the bridge consumes from its surroundings
//!
//! The bridge never talks to an editor or the OS clipboard directly. It goes
//! through [`HostEditor`] and [`ClipboardPort`], so the same pipeline drives a
//! real application (see `editor::keyboard`) or an in-memory document.

use std::fmt;

/// Failure reading or writing the OS clipboard
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardError {
    /// The clipboard could not be opened (held by another process, no display)
    #[error("clipboard unavailable")]
    Unavailable,
    /// The clipboard holds something other than text
    #[error("clipboard does not contain text")]
    NotText,
    #[error("clipboard access failed: {0}")]
    Access(String),
}

/// Failure of a host editor call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("no document is open")]
    NoDocument,
    #[error("editor does not have focus")]
    NoFocus,
    #[error("editor rejected the request: {0}")]
    Rejected(String),
    /// Synthetic input could not be delivered
    #[error("input error: {0}")]
    Input(String),
}

/// Break inserted by a navigation command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakKind {
    Line,
    Paragraph,
    Tab,
}

impl BreakKind {
    /// Text equivalent of the break
    pub fn as_str(self) -> &'static str {
        match self {
            BreakKind::Line => "\n",
            BreakKind::Paragraph => "\n\n",
            BreakKind::Tab => "\t",
        }
    }
}

/// Character formatting attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Bold,
    Italic,
    Underline,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatKind::Bold => write!(f, "bold"),
            FormatKind::Italic => write!(f, "italic"),
            FormatKind::Underline => write!(f, "underline"),
        }
    }
}

/// Span of document text, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub len: usize,
}

impl TextSpan {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// What a formatting toggle applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTarget {
    /// The editor's current selection
    Selection,
    /// An explicit span, typically the last dictated text
    Span(TextSpan),
    /// Collapsed cursor: the attribute applies to what is typed next
    Cursor,
}

/// Document editing capability of the host application
///
/// Every call may fail; the bridge reports failures and carries on.
pub trait HostEditor {
    /// Character immediately before the cursor, `None` at the start of the document
    fn char_before_cursor(&mut self) -> Result<Option<char>, HostError>;

    /// Insert text at the cursor, replacing any selection.
    /// Returns where the text landed.
    fn insert_text(&mut self, text: &str) -> Result<TextSpan, HostError>;

    fn insert_break(&mut self, kind: BreakKind) -> Result<(), HostError>;

    fn select_all(&mut self) -> Result<(), HostError>;

    fn delete_selection(&mut self) -> Result<(), HostError>;

    /// Returns `false` when there was nothing to undo
    fn undo(&mut self) -> Result<bool, HostError>;

    /// Returns `false` when there was nothing to redo
    fn redo(&mut self) -> Result<bool, HostError>;

    fn has_selection(&mut self) -> Result<bool, HostError>;

    fn toggle_format(&mut self, kind: FormatKind, target: FormatTarget) -> Result<(), HostError>;

    /// Cut the selection to the OS clipboard
    fn cut(&mut self) -> Result<(), HostError>;

    /// Copy the selection to the OS clipboard
    fn copy(&mut self) -> Result<(), HostError>;

    /// Paste the OS clipboard at the cursor
    fn paste(&mut self) -> Result<(), HostError>;

    fn save(&mut self) -> Result<(), HostError>;

    /// Text the editor left on the OS clipboard as a side effect of its last
    /// calls (typing through the clipboard without restoring it). Taken once.
    fn take_clipboard_residue(&mut self) -> Option<String> {
        None
    }
}

/// Text access to the OS clipboard
pub trait ClipboardPort {
    fn read_text(&mut self) -> Result<String, ClipboardError>;

    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}
