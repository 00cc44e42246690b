//! Common handle types for the WorldView environment abstraction.

use serde::{Deserialize, Serialize};

/// Handle to a timeout or interval registered in a timer queue.
///
/// Handles are allocated from a monotonically increasing counter and are
/// never reused within one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

impl TimerId {
    /// Returns the raw counter value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Handle to a registered output listener (popup, layer toggle, state change).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}
