use std::ops::Deref;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::error::{CaptureError, ErrorKind};
use super::state::StateEvent;

/// One channel of audio, exactly `block_size` samples long, in arrival order.
///
/// Cheap to clone; the samples are shared and never mutated after emission.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    samples: Arc<[f32]>,
}

impl AudioBlock {
    pub(crate) fn new(samples: Vec<f32>) -> Self {
        Self {
            samples: samples.into(),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl Deref for AudioBlock {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.samples
    }
}

impl Serialize for AudioBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.samples.as_ref().serialize(serializer)
    }
}

/// Failure notification delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    #[serde(rename = "code")]
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CaptureError> for ErrorEvent {
    fn from(error: &CaptureError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Everything the engine reports, in the tagged form hosts receive.
///
/// ```text
/// {"kind":"audio","samples":[...]}
/// {"kind":"state","value":"started"}
/// {"kind":"error","code":"not_supported","message":"..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CaptureEvent {
    Audio { samples: AudioBlock },
    State { value: StateEvent },
    Error(ErrorEvent),
}

impl CaptureEvent {
    pub fn to_json(&self) -> Result<String, CaptureError> {
        serde_json::to_string(self)
            .map_err(|e| CaptureError::CaptureFailed(format!("failed to encode event: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_event_json() {
        let event = CaptureEvent::Audio {
            samples: AudioBlock::new(vec![0.5, -0.25]),
        };
        assert_eq!(event.to_json().unwrap(), r#"{"kind":"audio","samples":[0.5,-0.25]}"#);
    }

    #[test]
    fn state_event_json() {
        let event = CaptureEvent::State {
            value: StateEvent::Paused,
        };
        assert_eq!(event.to_json().unwrap(), r#"{"kind":"state","value":"paused"}"#);
    }

    #[test]
    fn error_event_json() {
        let event = CaptureEvent::Error(ErrorEvent::from(&CaptureError::NotSupported));
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["kind"], "error");
        assert_eq!(value["code"], "not_supported");
        assert!(value["message"].as_str().unwrap().contains("not supported"));
    }

    #[test]
    fn block_derefs_to_samples() {
        let block = AudioBlock::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(block.len(), 3);
        assert_eq!(&block[1..], &[2.0, 3.0]);
    }
}
