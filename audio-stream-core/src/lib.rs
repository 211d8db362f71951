//! # audio-stream-core
//!
//! Platform-agnostic audio stream capture core library.
//!
//! Captures from a microphone or a playback-loopback grant and delivers the
//! stream as fixed-size mono blocks, with start/stop/pause/resume control and
//! ordered state and error events. Platform backends (Windows WASAPI) implement
//! `CaptureBackend` and plug into the generic `CaptureSessionController`.
//!
//! ## Architecture
//!
//! ```text
//! audio-stream-core (this crate)
//! ├── traits/       ← AudioSource, CaptureBackend, EventSink, StatusPresenter, GrantProvider
//! ├── models/       ← CaptureConfig, CaptureError, SessionState, CaptureEvent, CaptureGrant
//! ├── processing/   ← SampleAccumulator (downmix + block reassembly), buffer sizing
//! ├── session/      ← CaptureSessionController, CaptureLoop, open_source
//! └── host/         ← Command, HostRequest, GrantBroker, CaptureService
//! ```

pub mod host;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use host::command::{Command, CommandOutcome, HostRequest};
pub use host::grant::{GrantBroker, GrantResponder, PendingGrant};
pub use host::service::CaptureService;
pub use models::config::{CaptureConfig, LoopTiming, SourceType};
pub use models::error::{CaptureError, ErrorKind};
pub use models::events::{AudioBlock, CaptureEvent, ErrorEvent};
pub use models::grant::{CaptureGrant, GrantDenial};
pub use models::state::{SessionState, StateEvent};
pub use processing::buffer_size::capture_buffer_bytes;
pub use processing::sample_accumulator::SampleAccumulator;
pub use session::capture_loop::{CaptureLoop, LoopControl, LoopExit};
pub use session::controller::{CaptureSessionController, SessionInfo};
pub use session::open::open_source;
pub use traits::audio_source::{AudioSource, CaptureBackend, OpenSource};
pub use traits::event_sink::{ChannelSink, EventSink};
pub use traits::grant_provider::GrantProvider;
pub use traits::presenter::{PresentationState, StatusPresenter};
