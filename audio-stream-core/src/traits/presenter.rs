use serde::Serialize;

/// Snapshot used to refresh the host's persistent status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationState {
    /// A session exists (recording or paused).
    pub is_recording: bool,
    pub is_paused: bool,
}

impl PresentationState {
    pub fn status_text(&self) -> &'static str {
        match (self.is_recording, self.is_paused) {
            (true, true) => "Paused",
            (true, false) => "Recording",
            _ => "Idle",
        }
    }
}

/// Builds the host's status display (e.g. a persistent notification).
///
/// Only ever used to show state; it has no influence on capture.
pub trait StatusPresenter {
    type Output;

    fn render(&self, is_recording: bool, is_paused: bool) -> Self::Output;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text() {
        assert_eq!(PresentationState::default().status_text(), "Idle");
        let recording = PresentationState {
            is_recording: true,
            is_paused: false,
        };
        assert_eq!(recording.status_text(), "Recording");
        let paused = PresentationState {
            is_recording: true,
            is_paused: true,
        };
        assert_eq!(paused.status_text(), "Paused");
    }
}
