//! Answer and event status codes

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric status carried by answers and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub i32);

impl Status {
    pub const OK: Status = Status(200);
    /// Not yet decided, or operation not recognised
    pub const UNKNOWN: Status = Status(380);
    pub const FAIL: Status = Status(400);

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self == Status::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}
