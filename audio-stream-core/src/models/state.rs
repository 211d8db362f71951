use serde::{Deserialize, Serialize};

/// Controller state machine.
///
/// State transitions:
/// ```text
/// idle → starting → recording ⇄ paused
///           ↓           ↓         ↓
///         idle  ←──  stopping  ←──┘
/// ```
/// `Starting` and `Stopping` are only visible while a command is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Starting,
    Recording,
    Paused,
    Stopping,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Whether a session (and its source) currently exists.
    pub fn has_session(&self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }
}

/// Lifecycle notification delivered to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateEvent {
    Started,
    Stopped,
    Paused,
    Resumed,
}
