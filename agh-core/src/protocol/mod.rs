//! Textual command protocol
//!
//! Inbound requests arrive as `AT = ( id, "op", args... )`, answers leave
//! as `IH = ( id, status, "text"... )` and spontaneous notifications as
//! `EVENT = ( event_id, status, "name"... )`. Parsing is strict: a rejected
//! line never produces a [`Command`]. Rendering consumes the [`Answer`] or
//! [`Event`], so every reply is produced exactly once.

pub mod answer;
pub mod command;
pub mod event;
mod parser;
pub mod source;
pub mod status;

pub use answer::Answer;
pub use command::{Arg, Command};
pub use event::{Event, EventIds};
pub use source::SourceTag;
pub use status::Status;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keyword of an inbound command
pub const COMMAND_KEYWORD: &str = "AT";
/// Keyword of a rendered answer
pub const ANSWER_KEYWORD: &str = "IH";
/// Keyword of a rendered event
pub const EVENT_KEYWORD: &str = "EVENT";
/// Marker string announcing a raw data payload after the closing parenthesis
pub const DATA_MARKER: &str = "DATA";

/// Substituted when an answer is rendered without any text part
pub const BUG_EMPTY_ANSWER_TEXT: &str = "BUG: empty answer";
/// Substituted when an event is rendered without a name
pub const BUG_EMPTY_EVENT_NAME: &str = "BUG: empty event";

/// Default maximum length of an inbound command line, in bytes
pub const MAX_TEXT_LEN: usize = 120;
/// Default maximum length of an operation name, in bytes
pub const MAX_OP_NAME_LEN: usize = 10;
/// Default maximum length of a source tag, in bytes
pub const MAX_FROM_LEN: usize = 64;

/// Size limits applied while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum inbound text length
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
    /// Maximum operation name length
    #[serde(default = "default_max_op_name_len")]
    pub max_op_name_len: usize,
    /// Maximum source tag length
    #[serde(default = "default_max_from_len")]
    pub max_from_len: usize,
}

fn default_max_text_len() -> usize {
    MAX_TEXT_LEN
}

fn default_max_op_name_len() -> usize {
    MAX_OP_NAME_LEN
}

fn default_max_from_len() -> usize {
    MAX_FROM_LEN
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_text_len: MAX_TEXT_LEN,
            max_op_name_len: MAX_OP_NAME_LEN,
            max_from_len: MAX_FROM_LEN,
        }
    }
}

/// Reasons a command line is rejected, in the order they are checked
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("text is {len} bytes long, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("syntax error at offset {offset}: {reason}")]
    Syntax { offset: usize, reason: String },

    #[error("expected exactly one top-level setting, found {0}")]
    SettingCount(usize),

    #[error("unexpected keyword '{0}'")]
    Keyword(String),

    #[error("command value is not a list")]
    NotAList,

    #[error("command list has {0} element(s), at least 2 are required")]
    TooFewElements(usize),

    #[error("command id must be an integer >= 1")]
    InvalidId,

    #[error("operation must be a string of 1 to {max} bytes")]
    InvalidOperation { max: usize },

    #[error("source tag must be 1 to {max} bytes")]
    InvalidSource { max: usize },
}

/// Quote `s` for the wire
///
/// Produces exactly one line: newlines and other control characters are
/// written as the escapes the command parser reads back.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0c}' => out.push_str("\\f"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
