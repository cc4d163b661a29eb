//! Host editor driven by synthetic keystrokes
//!
//! Sends platform shortcuts to whatever window has focus:
//! - **Direct**: enigo's native text input
//! - **Clipboard**: set the clipboard, send Cmd/Ctrl+V, restore the old contents
//!
//! The focused application cannot be queried, so the editor keeps its own
//! idea of the cursor position and of the character before it, based only on
//! what it has typed. Anything the user does by hand invalidates that.

use std::thread;
use std::time::Duration;

use arboard::Clipboard;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::{debug, warn};

use crate::config::{InputConfig, InputMethod};
use crate::ports::{
    BreakKind, ClipboardError, ClipboardPort, FormatKind, FormatTarget, HostEditor, HostError,
    TextSpan,
};

/// Time for the focused application to publish a cut or copy
const CLIPBOARD_SETTLE: Duration = Duration::from_millis(100);

/// Shortcut letter toggling a character format
fn format_shortcut(kind: FormatKind) -> char {
    match kind {
        FormatKind::Bold => 'b',
        FormatKind::Italic => 'i',
        FormatKind::Underline => 'u',
    }
}

/// Arrow presses needed to select `span`: (left moves to reach its end, shift-left presses)
fn span_moves(cursor: usize, span: TextSpan) -> (usize, usize) {
    (cursor.saturating_sub(span.end()), span.len)
}

fn input_error(action: &str, e: impl std::fmt::Display) -> HostError {
    HostError::Input(format!("failed to {}: {}", action, e))
}

pub struct KeystrokeEditor {
    enigo: Enigo,
    clipboard: Clipboard,
    method: InputMethod,
    key_delay: Duration,
    /// Characters typed since the editor was created
    cursor: usize,
    last_char: Option<char>,
    selection: bool,
    /// Text we typed through the clipboard and could not restore over
    clipboard_residue: Option<String>,
}

impl KeystrokeEditor {
    pub fn new(config: &InputConfig) -> Result<Self, HostError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| input_error("initialize keyboard", e))?;
        let clipboard = Clipboard::new().map_err(|e| input_error("initialize clipboard", e))?;

        Ok(Self {
            enigo,
            clipboard,
            method: config.method,
            key_delay: Duration::from_millis(config.key_delay_ms),
            cursor: 0,
            last_char: None,
            selection: false,
            clipboard_residue: None,
        })
    }

    /// Platform modifier for shortcuts (Cmd on macOS, Ctrl elsewhere)
    pub fn modifier_key() -> Key {
        #[cfg(target_os = "macos")]
        {
            Key::Meta
        }
        #[cfg(not(target_os = "macos"))]
        {
            Key::Control
        }
    }

    fn send_key(&mut self, key: Key) -> Result<(), HostError> {
        self.enigo
            .key(key, Direction::Click)
            .map_err(|e| input_error("send key", e))
    }

    fn send_keys(&mut self, key: Key, times: usize) -> Result<(), HostError> {
        for _ in 0..times {
            self.send_key(key)?;
        }
        Ok(())
    }

    fn send_key_combo(&mut self, modifiers: &[Key], key: Key) -> Result<(), HostError> {
        for modifier in modifiers {
            self.enigo
                .key(*modifier, Direction::Press)
                .map_err(|e| input_error("press modifier", e))?;
        }

        thread::sleep(self.key_delay);
        let clicked = self
            .enigo
            .key(key, Direction::Click)
            .map_err(|e| input_error("click key", e));
        thread::sleep(self.key_delay);

        // Release even if the click failed, or the modifier stays stuck
        for modifier in modifiers.iter().rev() {
            self.enigo
                .key(*modifier, Direction::Release)
                .map_err(|e| input_error("release modifier", e))?;
        }
        clicked
    }

    fn shortcut(&mut self, letter: char) -> Result<(), HostError> {
        self.send_key_combo(&[Self::modifier_key()], Key::Unicode(letter))
    }

    fn type_text(&mut self, text: &str) -> Result<(), HostError> {
        match self.method {
            InputMethod::Direct => self.type_direct(text),
            InputMethod::Clipboard => match self.type_via_clipboard(text) {
                Ok(()) => Ok(()),
                Err(e) => {
                    warn!("clipboard input failed: {}, typing directly", e);
                    self.type_direct(text)
                }
            },
        }
    }

    fn type_direct(&mut self, text: &str) -> Result<(), HostError> {
        self.enigo
            .text(text)
            .map_err(|e| input_error("type text", e))
    }

    fn type_via_clipboard(&mut self, text: &str) -> Result<(), HostError> {
        let old_content = self.clipboard.get_text().ok();
        self.clipboard
            .set_text(text)
            .map_err(|e| input_error("set clipboard", e))?;
        thread::sleep(self.key_delay * 5);

        let pasted = self.shortcut('v');
        thread::sleep(CLIPBOARD_SETTLE);

        let restored = match old_content {
            Some(old) => match self.clipboard.set_text(old) {
                Ok(()) => true,
                Err(e) => {
                    warn!("could not restore clipboard: {}", e);
                    false
                }
            },
            None => {
                debug!("clipboard held no text before typing, leaving typed text there");
                false
            }
        };
        if !restored {
            self.clipboard_residue = Some(text.to_string());
        }
        pasted
    }

    /// Position is unknown after edits we cannot mirror
    fn forget_context(&mut self) {
        self.last_char = None;
        self.selection = false;
    }
}

impl HostEditor for KeystrokeEditor {
    fn char_before_cursor(&mut self) -> Result<Option<char>, HostError> {
        Ok(self.last_char)
    }

    fn take_clipboard_residue(&mut self) -> Option<String> {
        self.clipboard_residue.take()
    }

    fn insert_text(&mut self, text: &str) -> Result<TextSpan, HostError> {
        let len = text.chars().count();
        let span = TextSpan::new(self.cursor, len);
        if len == 0 {
            return Ok(span);
        }

        self.type_text(text)?;
        self.cursor += len;
        self.last_char = text.chars().last();
        self.selection = false;
        Ok(span)
    }

    fn insert_break(&mut self, kind: BreakKind) -> Result<(), HostError> {
        match kind {
            BreakKind::Line => self.send_key(Key::Return)?,
            BreakKind::Paragraph => self.send_keys(Key::Return, 2)?,
            BreakKind::Tab => self.send_key(Key::Tab)?,
        }
        let text = kind.as_str();
        self.cursor += text.chars().count();
        self.last_char = text.chars().last();
        self.selection = false;
        Ok(())
    }

    fn select_all(&mut self) -> Result<(), HostError> {
        self.shortcut('a')?;
        self.selection = true;
        Ok(())
    }

    fn delete_selection(&mut self) -> Result<(), HostError> {
        if !self.selection {
            debug!("delete with nothing selected");
            return Ok(());
        }
        self.send_key(Key::Backspace)?;
        self.cursor = 0;
        self.forget_context();
        Ok(())
    }

    fn undo(&mut self) -> Result<bool, HostError> {
        self.shortcut('z')?;
        self.forget_context();
        Ok(true)
    }

    fn redo(&mut self) -> Result<bool, HostError> {
        #[cfg(target_os = "macos")]
        self.send_key_combo(&[Key::Meta, Key::Shift], Key::Unicode('z'))?;
        #[cfg(not(target_os = "macos"))]
        self.shortcut('y')?;
        self.forget_context();
        Ok(true)
    }

    fn has_selection(&mut self) -> Result<bool, HostError> {
        Ok(self.selection)
    }

    fn toggle_format(&mut self, kind: FormatKind, target: FormatTarget) -> Result<(), HostError> {
        let letter = format_shortcut(kind);
        let span = match target {
            FormatTarget::Selection | FormatTarget::Cursor => return self.shortcut(letter),
            FormatTarget::Span(span) => span,
        };

        let (back, select) = span_moves(self.cursor, span);
        self.send_keys(Key::LeftArrow, back)?;
        for _ in 0..select {
            self.send_key_combo(&[Key::Shift], Key::LeftArrow)?;
        }
        self.shortcut(letter)?;

        // Collapse the selection at its end, then return to where typing stopped
        self.send_key(Key::RightArrow)?;
        self.send_keys(Key::RightArrow, back)
    }

    fn cut(&mut self) -> Result<(), HostError> {
        self.shortcut('x')?;
        thread::sleep(CLIPBOARD_SETTLE);
        self.forget_context();
        Ok(())
    }

    fn copy(&mut self) -> Result<(), HostError> {
        self.shortcut('c')?;
        thread::sleep(CLIPBOARD_SETTLE);
        Ok(())
    }

    fn paste(&mut self) -> Result<(), HostError> {
        self.shortcut('v')?;
        self.forget_context();
        Ok(())
    }

    fn save(&mut self) -> Result<(), HostError> {
        self.shortcut('s')
    }
}

/// The desktop clipboard
pub struct SystemClipboard {
    clipboard: Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let clipboard = Clipboard::new().map_err(|e| {
            warn!("system clipboard unavailable: {}", e);
            ClipboardError::Unavailable
        })?;
        Ok(Self { clipboard })
    }
}

impl ClipboardPort for SystemClipboard {
    fn read_text(&mut self) -> Result<String, ClipboardError> {
        self.clipboard.get_text().map_err(|e| match e {
            arboard::Error::ContentNotAvailable => ClipboardError::NotText,
            other => ClipboardError::Access(other.to_string()),
        })
    }

    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.clipboard
            .set_text(text)
            .map_err(|e| ClipboardError::Access(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_shortcuts() {
        assert_eq!(format_shortcut(FormatKind::Bold), 'b');
        assert_eq!(format_shortcut(FormatKind::Italic), 'i');
        assert_eq!(format_shortcut(FormatKind::Underline), 'u');
    }

    #[test]
    fn test_span_moves_from_end_of_span() {
        // "Hello world" typed, cursor right after it
        assert_eq!(span_moves(11, TextSpan::new(0, 11)), (0, 11));
    }

    #[test]
    fn test_span_moves_after_punctuation() {
        // " world" followed by "." then a paragraph break
        assert_eq!(span_moves(14, TextSpan::new(6, 5)), (3, 5));
    }
}
