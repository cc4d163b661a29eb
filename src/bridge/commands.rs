//! Spoken command vocabulary and classification
//!
//! Dictation arrives one clipboard payload at a time. A payload is a command
//! only when, trimmed and lowercased, it is exactly one of the phrases below.
//! Everything else is dictated text and is inserted as-is.

use std::collections::HashMap;
use std::fmt;

use crate::ports::{BreakKind, FormatKind};

/// Editing primitive requested by voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    Undo,
    Redo,
    /// Undo of the last insertion
    Scratch,
    SelectAll,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipboardKind {
    Cut,
    Copy,
    Paste,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Save,
}

/// Classified clipboard payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Dictated text
    Literal(String),
    Punctuation(char),
    Navigation(BreakKind),
    EditOp(EditKind),
    FormatOp(FormatKind),
    ClipboardOp(ClipboardKind),
    FileOp(FileKind),
    /// Looks like a command ("highlight that") but is not in the vocabulary
    Unknown(String),
}

/// Command category, for status display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Literal,
    Punctuation,
    Navigation,
    Edit,
    Format,
    Clipboard,
    File,
    Unknown,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Literal(_) => CommandKind::Literal,
            Command::Punctuation(_) => CommandKind::Punctuation,
            Command::Navigation(_) => CommandKind::Navigation,
            Command::EditOp(_) => CommandKind::Edit,
            Command::FormatOp(_) => CommandKind::Format,
            Command::ClipboardOp(_) => CommandKind::Clipboard,
            Command::FileOp(_) => CommandKind::File,
            Command::Unknown(_) => CommandKind::Unknown,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Literal => "literal",
            CommandKind::Punctuation => "punctuation",
            CommandKind::Navigation => "navigation",
            CommandKind::Edit => "edit",
            CommandKind::Format => "format",
            CommandKind::Clipboard => "clipboard",
            CommandKind::File => "file",
            CommandKind::Unknown => "unknown",
        };
        f.pad(name)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Literal(text) => write!(f, "literal {:?}", text),
            Command::Punctuation(c) => write!(f, "punctuation {:?}", c),
            Command::Navigation(kind) => write!(f, "navigation {:?}", kind),
            Command::EditOp(kind) => write!(f, "edit {:?}", kind),
            Command::FormatOp(kind) => write!(f, "format {}", kind),
            Command::ClipboardOp(kind) => write!(f, "clipboard {:?}", kind),
            Command::FileOp(kind) => write!(f, "file {:?}", kind),
            Command::Unknown(text) => write!(f, "unknown command {:?}", text),
        }
    }
}

const PUNCTUATION: &[(&str, char)] = &[
    ("period", '.'),
    ("comma", ','),
    ("question mark", '?'),
    ("exclamation point", '!'),
    ("exclamation mark", '!'),
    ("colon", ':'),
    ("semicolon", ';'),
    ("open quote", '\u{201C}'),
    ("close quote", '\u{201D}'),
    ("open single quote", '\u{2018}'),
    ("close single quote", '\u{2019}'),
    ("open paren", '('),
    ("close paren", ')'),
    ("hyphen", '-'),
    ("dash", '\u{2014}'),
    ("ellipsis", '\u{2026}'),
];

const NAVIGATION: &[(&str, BreakKind)] = &[
    ("new line", BreakKind::Line),
    ("new paragraph", BreakKind::Paragraph),
    ("tab key", BreakKind::Tab),
];

const EDITING: &[(&str, EditKind)] = &[
    ("undo that", EditKind::Undo),
    ("redo that", EditKind::Redo),
    ("scratch that", EditKind::Scratch),
    ("select all", EditKind::SelectAll),
    ("delete that", EditKind::Delete),
];

const FORMATTING: &[(&str, FormatKind)] = &[
    ("bold that", FormatKind::Bold),
    ("italicize that", FormatKind::Italic),
    ("underline that", FormatKind::Underline),
];

const CLIPBOARD: &[(&str, ClipboardKind)] = &[
    ("cut that", ClipboardKind::Cut),
    ("copy that", ClipboardKind::Copy),
    ("paste that", ClipboardKind::Paste),
];

const FILE: &[(&str, FileKind)] = &[("save document", FileKind::Save)];

/// Classifies clipboard payloads against the fixed vocabulary
pub struct CommandInterpreter {
    punctuation: HashMap<&'static str, char>,
    navigation: HashMap<&'static str, BreakKind>,
    editing: HashMap<&'static str, EditKind>,
    formatting: HashMap<&'static str, FormatKind>,
    clipboard: HashMap<&'static str, ClipboardKind>,
    file: HashMap<&'static str, FileKind>,
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandInterpreter {
    pub fn new() -> Self {
        Self {
            punctuation: PUNCTUATION.iter().copied().collect(),
            navigation: NAVIGATION.iter().copied().collect(),
            editing: EDITING.iter().copied().collect(),
            formatting: FORMATTING.iter().copied().collect(),
            clipboard: CLIPBOARD.iter().copied().collect(),
            file: FILE.iter().copied().collect(),
        }
    }

    /// Classify a payload.
    ///
    /// Matching is exact on the trimmed, lowercased text, checked in order:
    /// punctuation, navigation, editing, formatting, clipboard, file.
    /// Anything unmatched is kept verbatim (untrimmed) as a literal.
    pub fn classify(&self, payload: &str) -> Command {
        let phrase = payload.trim().to_lowercase();
        let phrase = phrase.as_str();

        if let Some(&c) = self.punctuation.get(phrase) {
            return Command::Punctuation(c);
        }
        if let Some(&kind) = self.navigation.get(phrase) {
            return Command::Navigation(kind);
        }
        if let Some(&kind) = self.editing.get(phrase) {
            return Command::EditOp(kind);
        }
        if let Some(&kind) = self.formatting.get(phrase) {
            return Command::FormatOp(kind);
        }
        if let Some(&kind) = self.clipboard.get(phrase) {
            return Command::ClipboardOp(kind);
        }
        if let Some(&kind) = self.file.get(phrase) {
            return Command::FileOp(kind);
        }

        if looks_like_command(phrase) {
            return Command::Unknown(payload.to_string());
        }

        Command::Literal(payload.to_string())
    }

    /// Voice command reference, for the CLI
    pub fn help_text() -> String {
        let mut out = String::new();
        out.push_str("╭─────────────────────────────────────────────────────────────╮\n");
        out.push_str("│                  VOICE COMMANDS                             │\n");
        push_section(&mut out, "PUNCTUATION", PUNCTUATION.iter().map(|(p, c)| (*p, c.to_string())));
        push_section(&mut out, "NAVIGATION", NAVIGATION.iter().map(|(p, k)| (*p, describe_break(*k))));
        push_section(&mut out, "EDITING", EDITING.iter().map(|(p, k)| (*p, format!("{:?}", k))));
        push_section(&mut out, "FORMATTING", FORMATTING.iter().map(|(p, k)| (*p, k.to_string())));
        push_section(&mut out, "CLIPBOARD", CLIPBOARD.iter().map(|(p, k)| (*p, format!("{:?}", k))));
        push_section(&mut out, "FILE", FILE.iter().map(|(p, k)| (*p, format!("{:?}", k))));
        out.push_str("├─────────────────────────────────────────────────────────────┤\n");
        out.push_str("│ Anything else is typed as dictated                          │\n");
        out.push_str("╰─────────────────────────────────────────────────────────────╯\n");
        out
    }
}

/// Two words ending in "that", the shape of every editing command
fn looks_like_command(phrase: &str) -> bool {
    let mut words = phrase.split_whitespace();
    matches!(
        (words.next(), words.next(), words.next()),
        (Some(_), Some("that"), None)
    )
}

fn describe_break(kind: BreakKind) -> String {
    match kind {
        BreakKind::Line => "⏎".to_string(),
        BreakKind::Paragraph => "⏎⏎".to_string(),
        BreakKind::Tab => "⇥".to_string(),
    }
}

fn push_section<I>(out: &mut String, title: &str, rows: I)
where
    I: Iterator<Item = (&'static str, String)>,
{
    out.push_str("├─────────────────────────────────────────────────────────────┤\n");
    out.push_str(&format!("│ {:<60}│\n", title));
    for (phrase, action) in rows {
        out.push_str(&format!("│   {:<30} {:<28}│\n", phrase, action));
    }
}
