//! In-memory document and clipboard
//!
//! Used by `replay` and by tests. Both are handles around shared state, so a
//! clone kept outside the controller can inspect what the bridge did.

use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ports::{
    BreakKind, ClipboardError, ClipboardPort, FormatKind, FormatTarget, HostEditor, HostError,
    TextSpan,
};

// ============================================================================
// Clipboard
// ============================================================================

#[derive(Debug, Default)]
struct ClipboardState {
    text: String,
    read_error: Option<ClipboardError>,
    write_error: Option<ClipboardError>,
    reads: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    state: Arc<Mutex<ClipboardState>>,
}

impl MemoryClipboard {
    pub fn with_text(text: &str) -> Self {
        let clipboard = Self::default();
        clipboard.set(text);
        clipboard
    }

    /// Replace the contents from outside the bridge, as the dictation engine would
    pub fn set(&self, text: &str) {
        self.lock().text = text.to_string();
    }

    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    /// Make every read fail with `error` until cleared with `None`
    pub fn fail_reads(&self, error: Option<ClipboardError>) {
        self.lock().read_error = error;
    }

    /// Make every write fail with `error` until cleared with `None`
    pub fn fail_writes(&self, error: Option<ClipboardError>) {
        self.lock().write_error = error;
    }

    /// Number of read attempts, failed ones included
    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    fn lock(&self) -> MutexGuard<'_, ClipboardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ClipboardPort for MemoryClipboard {
    fn read_text(&mut self) -> Result<String, ClipboardError> {
        let mut state = self.lock();
        state.reads += 1;
        match &state.read_error {
            Some(error) => Err(error.clone()),
            None => Ok(state.text.clone()),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut state = self.lock();
        if let Some(error) = &state.write_error {
            return Err(error.clone());
        }
        state.text = text.to_string();
        Ok(())
    }
}

// ============================================================================
// Document
// ============================================================================

#[derive(Debug, Clone)]
struct Revision {
    text: Vec<char>,
    cursor: usize,
}

#[derive(Debug)]
struct DocumentState {
    text: Vec<char>,
    cursor: usize,
    selection: Option<Range<usize>>,
    undo: Vec<Revision>,
    redo: Vec<Revision>,
    /// Formatted ranges; ranges are not adjusted when text moves
    formats: Vec<(FormatKind, Range<usize>)>,
    /// Attributes toggled at a collapsed cursor
    pending_formats: Vec<FormatKind>,
    saves: usize,
    open: bool,
    fail_next: Option<HostError>,
    calls: usize,
    /// Insert text by pasting it, leaving it on the clipboard
    clipboard_typing: bool,
    residue: Option<String>,
}

/// Plain-text document with a cursor, a selection, and undo history
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    state: Arc<Mutex<DocumentState>>,
    clipboard: MemoryClipboard,
}

impl MemoryDocument {
    pub fn new(clipboard: MemoryClipboard) -> Self {
        Self::with_text("", clipboard)
    }

    /// Document holding `text` with the cursor at the end
    pub fn with_text(text: &str, clipboard: MemoryClipboard) -> Self {
        let text: Vec<char> = text.chars().collect();
        let cursor = text.len();
        Self {
            state: Arc::new(Mutex::new(DocumentState {
                text,
                cursor,
                selection: None,
                undo: Vec::new(),
                redo: Vec::new(),
                formats: Vec::new(),
                pending_formats: Vec::new(),
                saves: 0,
                open: true,
                fail_next: None,
                calls: 0,
                clipboard_typing: false,
                residue: None,
            })),
            clipboard,
        }
    }

    pub fn text(&self) -> String {
        self.lock().text.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    pub fn set_cursor(&self, position: usize) {
        let mut state = self.lock();
        state.cursor = position.min(state.text.len());
        state.selection = None;
    }

    pub fn select(&self, range: Range<usize>) {
        let mut state = self.lock();
        let end = range.end.min(state.text.len());
        let start = range.start.min(end);
        state.cursor = end;
        state.selection = Some(start..end);
    }

    pub fn selection(&self) -> Option<Range<usize>> {
        self.lock().selection.clone()
    }

    /// Ranges currently carrying `kind`, in the order they were applied
    pub fn formatted(&self, kind: FormatKind) -> Vec<Range<usize>> {
        self.lock()
            .formats
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, range)| range.clone())
            .collect()
    }

    pub fn pending_formats(&self) -> Vec<FormatKind> {
        self.lock().pending_formats.clone()
    }

    pub fn saves(&self) -> usize {
        self.lock().saves
    }

    /// Host calls received, failed ones included
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Simulate the user closing the document: every call fails
    pub fn close(&self) {
        self.lock().open = false;
    }

    /// Type inserted text through the clipboard and never restore it, like a
    /// keystroke editor whose clipboard restore failed
    pub fn type_through_clipboard(&self, enabled: bool) {
        self.lock().clipboard_typing = enabled;
    }

    /// Fail the next host call with `error`
    pub fn fail_next(&self, error: HostError) {
        self.lock().fail_next = Some(error);
    }

    fn lock(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Common entry for every host call
    fn begin(&self) -> Result<MutexGuard<'_, DocumentState>, HostError> {
        let mut state = self.lock();
        state.calls += 1;
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }
        if !state.open {
            return Err(HostError::NoDocument);
        }
        Ok(state)
    }
}

impl DocumentState {
    fn checkpoint(&mut self) {
        let revision = self.revision();
        self.undo.push(revision);
        self.redo.clear();
    }

    fn restore(&mut self, revision: Revision) {
        self.text = revision.text;
        self.cursor = revision.cursor.min(self.text.len());
        self.selection = None;
    }

    fn revision(&self) -> Revision {
        Revision {
            text: self.text.clone(),
            cursor: self.cursor,
        }
    }

    fn selected(&self) -> Option<Range<usize>> {
        self.selection.clone().filter(|range| !range.is_empty())
    }

    /// Replace the selection (or nothing) at the cursor with `text`
    fn replace(&mut self, text: &str) -> TextSpan {
        self.checkpoint();
        let start = match self.selection.take() {
            Some(range) => {
                self.text.drain(range.clone());
                range.start
            }
            None => self.cursor,
        };
        let inserted: Vec<char> = text.chars().collect();
        let len = inserted.len();
        self.text.splice(start..start, inserted);
        self.cursor = start + len;
        TextSpan::new(start, len)
    }

    fn toggle(&mut self, kind: FormatKind, range: Range<usize>) {
        if let Some(index) = self
            .formats
            .iter()
            .position(|(k, r)| *k == kind && *r == range)
        {
            self.formats.remove(index);
        } else {
            self.formats.push((kind, range));
        }
    }
}

impl HostEditor for MemoryDocument {
    fn char_before_cursor(&mut self) -> Result<Option<char>, HostError> {
        let state = self.begin()?;
        let position = state
            .selection
            .as_ref()
            .map_or(state.cursor, |range| range.start);
        Ok(position
            .checked_sub(1)
            .and_then(|i| state.text.get(i).copied()))
    }

    fn insert_text(&mut self, text: &str) -> Result<TextSpan, HostError> {
        let mut clipboard = self.clipboard.clone();
        let mut state = self.begin()?;
        if state.clipboard_typing && !text.is_empty() {
            clipboard
                .write_text(text)
                .map_err(|e| HostError::Input(e.to_string()))?;
            state.residue = Some(text.to_string());
        }
        Ok(state.replace(text))
    }

    fn insert_break(&mut self, kind: BreakKind) -> Result<(), HostError> {
        let mut state = self.begin()?;
        state.replace(kind.as_str());
        Ok(())
    }

    fn select_all(&mut self) -> Result<(), HostError> {
        let mut state = self.begin()?;
        let len = state.text.len();
        state.selection = Some(0..len);
        state.cursor = len;
        Ok(())
    }

    fn delete_selection(&mut self) -> Result<(), HostError> {
        let mut state = self.begin()?;
        if state.selected().is_some() {
            state.replace("");
        }
        Ok(())
    }

    fn undo(&mut self) -> Result<bool, HostError> {
        let mut state = self.begin()?;
        let Some(revision) = state.undo.pop() else {
            return Ok(false);
        };
        let current = state.revision();
        state.redo.push(current);
        state.restore(revision);
        Ok(true)
    }

    fn redo(&mut self) -> Result<bool, HostError> {
        let mut state = self.begin()?;
        let Some(revision) = state.redo.pop() else {
            return Ok(false);
        };
        let current = state.revision();
        state.undo.push(current);
        state.restore(revision);
        Ok(true)
    }

    fn has_selection(&mut self) -> Result<bool, HostError> {
        let state = self.begin()?;
        Ok(state.selected().is_some())
    }

    fn toggle_format(&mut self, kind: FormatKind, target: FormatTarget) -> Result<(), HostError> {
        let mut state = self.begin()?;
        let len = state.text.len();
        let range = match target {
            FormatTarget::Selection => state.selected(),
            FormatTarget::Span(span) => Some(span.start.min(len)..span.end().min(len)),
            FormatTarget::Cursor => None,
        };

        match range {
            Some(range) => state.toggle(kind, range),
            None => match state.pending_formats.iter().position(|k| *k == kind) {
                Some(index) => {
                    state.pending_formats.remove(index);
                }
                None => state.pending_formats.push(kind),
            },
        }
        Ok(())
    }

    fn cut(&mut self) -> Result<(), HostError> {
        let mut clipboard = self.clipboard.clone();
        let mut state = self.begin()?;
        let Some(range) = state.selected() else {
            return Ok(());
        };
        let text: String = state.text[range].iter().collect();
        clipboard
            .write_text(&text)
            .map_err(|e| HostError::Rejected(e.to_string()))?;
        state.replace("");
        Ok(())
    }

    fn copy(&mut self) -> Result<(), HostError> {
        let mut clipboard = self.clipboard.clone();
        let state = self.begin()?;
        let Some(range) = state.selected() else {
            return Ok(());
        };
        let text: String = state.text[range].iter().collect();
        drop(state);
        clipboard
            .write_text(&text)
            .map_err(|e| HostError::Rejected(e.to_string()))
    }

    fn paste(&mut self) -> Result<(), HostError> {
        let mut clipboard = self.clipboard.clone();
        let mut state = self.begin()?;
        let text = clipboard
            .read_text()
            .map_err(|e| HostError::Rejected(e.to_string()))?;
        state.replace(&text);
        Ok(())
    }

    fn save(&mut self) -> Result<(), HostError> {
        let mut state = self.begin()?;
        state.saves += 1;
        Ok(())
    }

    fn take_clipboard_residue(&mut self) -> Option<String> {
        self.lock().residue.take()
    }
}
