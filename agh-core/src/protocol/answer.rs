//! Answers to parsed commands

use std::collections::VecDeque;
use std::fmt::Display;

use super::{quote, Status, ANSWER_KEYWORD, BUG_EMPTY_ANSWER_TEXT, DATA_MARKER};

/// Result of handling a [`Command`](super::Command)
///
/// Text parts are queued in insertion order. [`Answer::render`] takes the
/// answer by value, so it can be rendered at most once:
///
/// ```compile_fail
/// use agh_core::protocol::Answer;
///
/// let answer = Answer::new(1);
/// let first = answer.render();
/// let second = answer.render();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    id: u32,
    status: Status,
    parts: VecDeque<String>,
    is_data: bool,
}

impl Answer {
    /// Create an empty answer for command `id` with status `UNKNOWN`
    pub fn new(id: u32) -> Self {
        Self {
            id,
            status: Status::UNKNOWN,
            parts: VecDeque::new(),
            is_data: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) -> &mut Self {
        self.status = status;
        self
    }

    /// Append a text part
    pub fn add_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.parts.push_back(text.into());
        self
    }

    /// Render parts as a raw payload after a `"DATA"` marker
    pub fn set_data(&mut self, is_data: bool) -> &mut Self {
        self.is_data = is_data;
        self
    }

    pub fn is_data(&self) -> bool {
        self.is_data
    }

    /// Queued text parts, oldest first
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(String::as_str)
    }

    /// Render to wire text, consuming the answer
    pub fn render(self) -> String {
        render_frame(
            ANSWER_KEYWORD,
            self.id,
            self.status,
            self.parts,
            self.is_data,
            BUG_EMPTY_ANSWER_TEXT,
        )
    }
}

/// Shared `KEY = ( id, status, ... )` renderer for answers and events.
pub(crate) fn render_frame(
    keyword: &str,
    id: impl Display,
    status: Status,
    mut parts: VecDeque<String>,
    is_data: bool,
    empty_sentinel: &str,
) -> String {
    if parts.is_empty() {
        parts.push_back(empty_sentinel.to_string());
    }

    let mut out = format!("{} = ( {}, {}, ", keyword, id, status);
    if is_data {
        out.push_str(&quote(DATA_MARKER));
        out.push_str(" )");
        while let Some(part) = parts.pop_front() {
            out.push_str(&part);
        }
    } else {
        let mut first = true;
        while let Some(part) = parts.pop_front() {
            if !first {
                out.push_str(", ");
            }
            out.push_str(&quote(&part));
            first = false;
        }
        out.push_str(" )");
    }
    out
}
