//! # audio-stream-windows
//!
//! Windows WASAPI backend for audio-stream-core.
//!
//! Provides:
//! - `WasapiBackend`: `CaptureBackend` handing out WASAPI sources
//! - `WasapiSource`: Blocking, event-driven capture from the default
//!   microphone or, in loopback mode, from the default render endpoint
//! - `capabilities`: OS build probe gating loopback capture
//!
//! ## Platform Requirements
//! - Windows 10 1703+ (build 15063) for event-driven loopback
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_stream_core::{CaptureSessionController, ChannelSink};
//! use audio_stream_windows::WasapiBackend;
//!
//! let (sink, events) = ChannelSink::new();
//! let controller = CaptureSessionController::new(Arc::new(WasapiBackend::new()), Arc::new(sink));
//! ```

pub mod frames;

#[cfg(target_os = "windows")]
pub mod backend;
#[cfg(target_os = "windows")]
pub mod capabilities;
#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod wasapi_source;

#[cfg(target_os = "windows")]
pub use backend::WasapiBackend;
#[cfg(target_os = "windows")]
pub use wasapi_source::{Endpoint, WasapiSource};
