//! Applies classified commands to the host editor
//!
//! One command, one edit. The dispatcher remembers just enough between
//! commands to make the spoken vocabulary behave: where the last dictated
//! text landed (for "bold that") and what was last cut or copied from the
//! document (for "paste that").

use chrono::{DateTime, Utc};
use tracing::debug;

use super::commands::{ClipboardKind, Command, EditKind, FileKind};
use super::watcher::ClipboardWatcher;
use crate::ports::{
    BreakKind, ClipboardError, ClipboardPort, FormatKind, FormatTarget, HostEditor, HostError,
    TextSpan,
};

/// Characters that attach to the word before them; no auto-space in front
const HUGS_PRECEDING: &[char] = &[
    '.', ',', ';', ':', '!', '?', ')', ']', '}', '\u{201D}', '\u{2019}', '\u{2026}',
];

/// Characters after which dictated text starts without a space
const SENTENCE_OPENERS: &[char] = &['(', '[', '{', '\u{201C}', '\u{2018}', '\u{2014}'];

/// Why a single action did not complete
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error("nothing has been cut or copied from the document yet")]
    NothingToPaste,
}

pub struct ActionDispatcher {
    auto_space: bool,
    /// Span of the most recent dictated text, cleared when edits may have moved it
    last_literal: Option<TextSpan>,
    /// `last_literal` as it was before each undo, so redo can bring it back
    undone_literals: Vec<Option<TextSpan>>,
    /// Payload of the last cut/copy from the document
    document_clip: Option<String>,
}

impl ActionDispatcher {
    pub fn new(auto_space: bool) -> Self {
        Self {
            auto_space,
            last_literal: None,
            undone_literals: Vec::new(),
            document_clip: None,
        }
    }

    pub fn last_literal(&self) -> Option<TextSpan> {
        self.last_literal
    }

    /// Perform one command. Returns a short description of what was done.
    ///
    /// Clipboard-writing commands register their payload with `watcher`
    /// before returning, so the next poll does not read it back as dictation.
    pub fn dispatch(
        &mut self,
        command: &Command,
        editor: &mut dyn HostEditor,
        clipboard: &mut dyn ClipboardPort,
        watcher: &mut ClipboardWatcher,
        now: DateTime<Utc>,
    ) -> Result<String, ActionError> {
        debug!("dispatching {}", command);

        let result = self.perform(command, editor, clipboard, watcher, now);

        // Registered even when the action failed; the text is on the clipboard either way
        if let Some(residue) = editor.take_clipboard_residue() {
            debug!("editor left {} chars on the clipboard", residue.chars().count());
            watcher.record_self_write(&residue, now);
        }
        result
    }

    fn perform(
        &mut self,
        command: &Command,
        editor: &mut dyn HostEditor,
        clipboard: &mut dyn ClipboardPort,
        watcher: &mut ClipboardWatcher,
        now: DateTime<Utc>,
    ) -> Result<String, ActionError> {
        if changes_text(command) {
            self.undone_literals.clear();
        }

        match command {
            Command::Literal(text) => self.insert_literal(text, editor),
            Command::Unknown(text) => {
                debug!("unrecognized command {:?}, inserting verbatim", text);
                self.insert_literal(text, editor)
            }
            Command::Punctuation(c) => {
                // Punctuation hugs the previous word regardless of auto-space
                editor.insert_text(&c.to_string())?;
                Ok(format!("inserted {:?}", c))
            }
            Command::Navigation(kind) => {
                editor.insert_break(*kind)?;
                Ok(match kind {
                    BreakKind::Line => "inserted line break",
                    BreakKind::Paragraph => "inserted paragraph break",
                    BreakKind::Tab => "inserted tab",
                }
                .to_string())
            }
            Command::EditOp(kind) => self.edit(*kind, editor),
            Command::FormatOp(kind) => self.format(*kind, editor),
            Command::ClipboardOp(kind) => self.clipboard(*kind, editor, clipboard, watcher, now),
            Command::FileOp(FileKind::Save) => {
                editor.save()?;
                Ok("saved document".to_string())
            }
        }
    }

    fn insert_literal(
        &mut self,
        text: &str,
        editor: &mut dyn HostEditor,
    ) -> Result<String, ActionError> {
        if text.is_empty() {
            return Ok("clipboard cleared, nothing inserted".to_string());
        }

        let lead = self.auto_space && self.needs_leading_space(text, editor)?;
        let to_insert = if lead {
            format!(" {}", text)
        } else {
            text.to_string()
        };

        let span = editor.insert_text(&to_insert)?;
        let lead = usize::from(lead);
        self.last_literal = Some(TextSpan::new(span.start + lead, span.len.saturating_sub(lead)));

        Ok(format!("inserted {:?}", to_insert))
    }

    fn needs_leading_space(
        &self,
        text: &str,
        editor: &mut dyn HostEditor,
    ) -> Result<bool, HostError> {
        let Some(first) = text.chars().next() else {
            return Ok(false);
        };
        if first.is_whitespace() || HUGS_PRECEDING.contains(&first) {
            return Ok(false);
        }

        Ok(match editor.char_before_cursor()? {
            // Start of the document
            None => false,
            Some(c) => !c.is_whitespace() && !SENTENCE_OPENERS.contains(&c),
        })
    }

    fn edit(&mut self, kind: EditKind, editor: &mut dyn HostEditor) -> Result<String, ActionError> {
        match kind {
            EditKind::Undo | EditKind::Scratch => {
                if editor.undo()? {
                    self.undone_literals.push(self.last_literal.take());
                    Ok("undid last change".to_string())
                } else {
                    Ok("nothing to undo".to_string())
                }
            }
            EditKind::Redo => {
                if editor.redo()? {
                    if let Some(span) = self.undone_literals.pop() {
                        self.last_literal = span;
                    }
                    Ok("redid last change".to_string())
                } else {
                    Ok("nothing to redo".to_string())
                }
            }
            EditKind::SelectAll => {
                editor.select_all()?;
                Ok("selected all".to_string())
            }
            EditKind::Delete => {
                editor.delete_selection()?;
                self.last_literal = None;
                Ok("deleted selection".to_string())
            }
        }
    }

    fn format(
        &mut self,
        kind: FormatKind,
        editor: &mut dyn HostEditor,
    ) -> Result<String, ActionError> {
        let target = if editor.has_selection()? {
            FormatTarget::Selection
        } else if let Some(span) = self.last_literal {
            FormatTarget::Span(span)
        } else {
            FormatTarget::Cursor
        };

        editor.toggle_format(kind, target)?;
        Ok(match target {
            FormatTarget::Selection => format!("toggled {} on selection", kind),
            FormatTarget::Span(span) => format!("toggled {} on last dictation ({} chars)", kind, span.len),
            FormatTarget::Cursor => format!("toggled {} at cursor", kind),
        })
    }

    fn clipboard(
        &mut self,
        kind: ClipboardKind,
        editor: &mut dyn HostEditor,
        clipboard: &mut dyn ClipboardPort,
        watcher: &mut ClipboardWatcher,
        now: DateTime<Utc>,
    ) -> Result<String, ActionError> {
        match kind {
            ClipboardKind::Cut | ClipboardKind::Copy => {
                if kind == ClipboardKind::Cut {
                    editor.cut()?;
                    self.last_literal = None;
                } else {
                    editor.copy()?;
                }

                let payload = match clipboard.read_text() {
                    Ok(payload) => payload,
                    Err(e) => {
                        // The editor may have put the selection there; do not read it back as dictation
                        watcher.expect_self_write();
                        return Err(e.into());
                    }
                };
                let verb = if kind == ClipboardKind::Cut { "cut" } else { "copied" };
                if payload == watcher.snapshot().payload() {
                    // Empty selection: the clipboard still holds the spoken phrase
                    return Ok(format!("nothing {}, selection empty", verb));
                }

                watcher.record_self_write(&payload, now);
                let message = format!("{} {} chars", verb, payload.chars().count());
                self.document_clip = Some(payload);
                Ok(message)
            }
            ClipboardKind::Paste => {
                let payload = self
                    .document_clip
                    .clone()
                    .ok_or(ActionError::NothingToPaste)?;

                clipboard.write_text(&payload)?;
                watcher.record_self_write(&payload, now);
                editor.paste()?;
                Ok(format!("pasted {} chars", payload.chars().count()))
            }
        }
    }
}

/// Commands after which the host's redo history no longer applies
fn changes_text(command: &Command) -> bool {
    match command {
        Command::Literal(_)
        | Command::Unknown(_)
        | Command::Punctuation(_)
        | Command::Navigation(_) => true,
        Command::EditOp(kind) => *kind == EditKind::Delete,
        Command::ClipboardOp(kind) => *kind != ClipboardKind::Copy,
        Command::FormatOp(_) | Command::FileOp(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::commands::CommandInterpreter;
    use crate::editor::{MemoryClipboard, MemoryDocument};

    struct Fixture {
        doc: MemoryDocument,
        clipboard: MemoryClipboard,
        watcher: ClipboardWatcher,
        dispatcher: ActionDispatcher,
        interpreter: CommandInterpreter,
    }

    impl Fixture {
        fn new(text: &str, auto_space: bool) -> Self {
            let clipboard = MemoryClipboard::with_text("");
            let doc = MemoryDocument::with_text(text, clipboard.clone());
            Self {
                doc,
                watcher: ClipboardWatcher::new("", Utc::now()),
                clipboard,
                dispatcher: ActionDispatcher::new(auto_space),
                interpreter: CommandInterpreter::default(),
            }
        }

        /// Dictate a phrase: it lands on the clipboard, then gets dispatched
        fn say(&mut self, phrase: &str) -> Result<String, ActionError> {
            self.clipboard.set(phrase);
            self.watcher
                .poll(&mut self.clipboard, Utc::now())
                .expect("phrase should be a clipboard change");
            self.perform(phrase)
        }

        /// Dispatch a phrase the watcher has already accepted
        fn perform(&mut self, phrase: &str) -> Result<String, ActionError> {
            let command = self.interpreter.classify(phrase);
            self.dispatcher.dispatch(
                &command,
                &mut self.doc,
                &mut self.clipboard,
                &mut self.watcher,
                Utc::now(),
            )
        }
    }

    #[test]
    fn test_auto_space_before_literal() {
        let mut fx = Fixture::new("Say", true);
        fx.say("hello").unwrap();
        assert_eq!(fx.doc.text(), "Say hello");
        assert_eq!(fx.dispatcher.last_literal(), Some(TextSpan::new(4, 5)));
    }

    #[test]
    fn test_no_auto_space_when_disabled() {
        let mut fx = Fixture::new("Say", false);
        fx.say("hello").unwrap();
        assert_eq!(fx.doc.text(), "Sayhello");
    }

    #[test]
    fn test_no_auto_space_at_boundaries() {
        let mut fx = Fixture::new("", true);
        fx.say("Start").unwrap();
        assert_eq!(fx.doc.text(), "Start");

        fx.say("new line").unwrap();
        fx.say("next").unwrap();
        assert_eq!(fx.doc.text(), "Start\nnext");

        fx.say("open quote").unwrap();
        fx.say("quoted").unwrap();
        assert_eq!(fx.doc.text(), "Start\nnext“quoted");
    }

    #[test]
    fn test_punctuation_hugs_previous_word() {
        let mut fx = Fixture::new("Hello", true);
        fx.say("period").unwrap();
        assert_eq!(fx.doc.text(), "Hello.");

        // A literal starting with punctuation does not get a space either
        fx.say(", and more").unwrap();
        assert_eq!(fx.doc.text(), "Hello., and more");
    }

    #[test]
    fn test_unknown_phrase_is_inserted() {
        let mut fx = Fixture::new("Text", true);
        fx.say("highlight that").unwrap();
        assert_eq!(fx.doc.text(), "Text highlight that");
    }

    #[test]
    fn test_empty_literal_inserts_nothing() {
        let mut fx = Fixture::new("Text", true);
        fx.clipboard.set("x");
        fx.watcher.poll(&mut fx.clipboard, Utc::now());
        fx.say("").unwrap();
        assert_eq!(fx.doc.text(), "Text");
    }

    #[test]
    fn test_scratch_with_nothing_to_undo_is_noop() {
        let mut fx = Fixture::new("", true);
        assert_eq!(fx.say("scratch that").unwrap(), "nothing to undo");
        assert_eq!(fx.say("undo that").unwrap(), "nothing to undo");
        assert_eq!(fx.say("redo that").unwrap(), "nothing to redo");
        assert_eq!(fx.doc.text(), "");
    }

    #[test]
    fn test_scratch_removes_last_dictation() {
        let mut fx = Fixture::new("Keep", true);
        fx.say("remove me").unwrap();
        fx.say("scratch that").unwrap();
        assert_eq!(fx.doc.text(), "Keep");
        assert_eq!(fx.dispatcher.last_literal(), None);

        fx.say("redo that").unwrap();
        assert_eq!(fx.doc.text(), "Keep remove me");
    }

    #[test]
    fn test_format_targets_last_literal_without_selection() {
        let mut fx = Fixture::new("", true);
        fx.say("Hello world").unwrap();
        fx.say("period").unwrap();
        fx.say("bold that").unwrap();
        assert_eq!(fx.doc.formatted(FormatKind::Bold), vec![0..11]);

        // Toggling again removes it
        fx.say("bold that").unwrap();
        assert!(fx.doc.formatted(FormatKind::Bold).is_empty());
    }

    #[test]
    fn test_format_prefers_selection() {
        let mut fx = Fixture::new("one two", true);
        fx.say("three").unwrap();
        fx.doc.select(0..3);
        fx.say("italicize that").unwrap();
        assert_eq!(fx.doc.formatted(FormatKind::Italic), vec![0..3]);
    }

    #[test]
    fn test_format_without_selection_or_dictation_applies_at_cursor() {
        let mut fx = Fixture::new("", true);
        let detail = fx.say("underline that").unwrap();
        assert_eq!(detail, "toggled underline at cursor");
    }

    #[test]
    fn test_copy_registers_self_write() {
        let mut fx = Fixture::new("copy this text", true);
        fx.doc.select(5..9);
        fx.say("copy that").unwrap();

        assert_eq!(fx.clipboard.text(), "this");
        assert_eq!(fx.watcher.snapshot().payload(), "this");
        // The next poll sees our own write, not dictation
        assert!(fx.watcher.poll(&mut fx.clipboard, Utc::now()).is_none());
    }

    #[test]
    fn test_copy_with_empty_selection_changes_nothing() {
        let mut fx = Fixture::new("text", true);
        let detail = fx.say("copy that").unwrap();
        assert_eq!(detail, "nothing copied, selection empty");
        assert_eq!(
            fx.say("paste that").unwrap_err(),
            ActionError::NothingToPaste
        );
    }

    #[test]
    fn test_cut_then_paste_moves_text() {
        let mut fx = Fixture::new("alpha beta", true);
        fx.doc.select(0..6);
        fx.say("cut that").unwrap();
        assert_eq!(fx.doc.text(), "beta");

        fx.doc.set_cursor(4);
        fx.say("new line").unwrap();
        fx.say("paste that").unwrap();
        assert_eq!(fx.doc.text(), "beta\nalpha ");
        assert_eq!(fx.clipboard.text(), "alpha ");
        assert!(fx.watcher.poll(&mut fx.clipboard, Utc::now()).is_none());
    }

    #[test]
    fn test_failed_paste_write_does_not_mark_self_write() {
        let mut fx = Fixture::new("alpha", true);
        fx.doc.select(0..5);
        fx.say("copy that").unwrap();
        fx.say("more").unwrap();

        fx.clipboard.fail_writes(Some(ClipboardError::Unavailable));
        let err = fx.say("paste that").unwrap_err();
        assert_eq!(err, ActionError::Clipboard(ClipboardError::Unavailable));
        assert_eq!(fx.watcher.snapshot().payload(), "paste that");
    }

    #[test]
    fn test_host_failure_is_reported() {
        let mut fx = Fixture::new("", true);
        fx.doc.close();
        let err = fx.say("hello").unwrap_err();
        assert_eq!(err, ActionError::Host(HostError::NoDocument));
        assert_eq!(err.to_string(), "no document is open");
    }

    #[test]
    fn test_save_and_select_all() {
        let mut fx = Fixture::new("text", true);
        fx.say("save document").unwrap();
        assert_eq!(fx.doc.saves(), 1);

        fx.say("select all").unwrap();
        fx.say("delete that").unwrap();
        assert_eq!(fx.doc.text(), "");
    }

    #[test]
    fn test_redo_restores_format_target() {
        let mut fx = Fixture::new("Keep", true);
        fx.say("remove me").unwrap();
        fx.say("scratch that").unwrap();
        fx.say("redo that").unwrap();
        assert_eq!(fx.dispatcher.last_literal(), Some(TextSpan::new(5, 9)));

        fx.say("bold that").unwrap();
        assert_eq!(fx.doc.formatted(FormatKind::Bold), vec![5..14]);
    }

    #[test]
    fn test_new_text_discards_undone_spans() {
        let mut fx = Fixture::new("", true);
        fx.say("first").unwrap();
        fx.say("undo that").unwrap();
        fx.say("second").unwrap();
        // The host has nothing to redo after new text
        assert_eq!(fx.say("redo that").unwrap(), "nothing to redo");
        assert_eq!(fx.dispatcher.last_literal(), Some(TextSpan::new(0, 6)));
    }

    #[test]
    fn test_cut_with_unreadable_clipboard_is_not_dictated_back() {
        let mut fx = Fixture::new("alpha beta", true);
        fx.doc.select(0..6);
        fx.clipboard.set("cut that");
        fx.watcher.poll(&mut fx.clipboard, Utc::now()).unwrap();

        fx.clipboard.fail_reads(Some(ClipboardError::Unavailable));
        let err = fx.perform("cut that").unwrap_err();
        assert_eq!(err, ActionError::Clipboard(ClipboardError::Unavailable));
        assert_eq!(fx.doc.text(), "beta");

        // The cut text shows up once reads recover, and is not inserted again
        fx.clipboard.fail_reads(None);
        assert!(fx.watcher.poll(&mut fx.clipboard, Utc::now()).is_none());
        assert_eq!(fx.doc.text(), "beta");

        fx.say("more").unwrap();
        assert_eq!(fx.doc.text(), "morebeta");
    }

    #[test]
    fn test_copy_with_unreadable_clipboard_is_not_dictated_back() {
        let mut fx = Fixture::new("alpha", true);
        fx.doc.select(0..5);
        fx.clipboard.set("copy that");
        fx.watcher.poll(&mut fx.clipboard, Utc::now()).unwrap();

        fx.clipboard.fail_reads(Some(ClipboardError::NotText));
        assert!(fx.perform("copy that").is_err());

        fx.clipboard.fail_reads(None);
        assert!(fx.watcher.poll(&mut fx.clipboard, Utc::now()).is_none());
        assert_eq!(fx.doc.text(), "alpha");
    }

    #[test]
    fn test_failed_host_paste_is_not_dictated_back() {
        let mut fx = Fixture::new("alpha", true);
        fx.doc.select(0..5);
        fx.say("copy that").unwrap();
        fx.doc.set_cursor(5);

        fx.doc.fail_next(HostError::NoFocus);
        let err = fx.say("paste that").unwrap_err();
        assert_eq!(err, ActionError::Host(HostError::NoFocus));
        assert_eq!(fx.clipboard.text(), "alpha");
        assert!(fx.watcher.poll(&mut fx.clipboard, Utc::now()).is_none());
        assert_eq!(fx.doc.text(), "alpha");
    }

    #[test]
    fn test_text_typed_through_clipboard_is_not_dictated_back() {
        let mut fx = Fixture::new("", true);
        fx.doc.type_through_clipboard(true);

        fx.say("Hello").unwrap();
        fx.say("period").unwrap();
        assert_eq!(fx.clipboard.text(), ".");
        assert!(fx.watcher.poll(&mut fx.clipboard, Utc::now()).is_none());
        assert_eq!(fx.doc.text(), "Hello.");

        fx.say("Bye").unwrap();
        assert_eq!(fx.doc.text(), "Hello. Bye");
    }
}
