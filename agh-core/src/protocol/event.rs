//! Spontaneous notifications

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use super::answer::render_frame;
use super::{Status, BUG_EMPTY_EVENT_NAME, EVENT_KEYWORD};

/// Source of event ids, owned by the agent context
#[derive(Debug)]
pub struct EventIds {
    next: AtomicU64,
}

impl EventIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate an id and start a new event with status `UNKNOWN`
    ///
    /// The id is fixed here; callers set the status afterwards.
    pub fn prepare(&self) -> Event {
        Event::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EventIds {
    fn default() -> Self {
        Self::new()
    }
}

/// An answer-only notification with no originating command
///
/// The first text part is the event name, later parts its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    id: u64,
    status: Status,
    parts: VecDeque<String>,
    is_data: bool,
}

impl Event {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            status: Status::UNKNOWN,
            parts: VecDeque::new(),
            is_data: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) -> &mut Self {
        self.status = status;
        self
    }

    pub fn add_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.parts.push_back(text.into());
        self
    }

    pub fn set_data(&mut self, is_data: bool) -> &mut Self {
        self.is_data = is_data;
        self
    }

    /// Render to wire text, consuming the event
    pub fn render(self) -> String {
        render_frame(
            EVENT_KEYWORD,
            self.id,
            self.status,
            self.parts,
            self.is_data,
            BUG_EMPTY_EVENT_NAME,
        )
    }
}
