use crate::models::config::{CaptureConfig, SourceType};
use crate::models::error::CaptureError;
use crate::models::grant::CaptureGrant;

/// An opened capture device.
///
/// Owned and read exclusively by the capture loop of one session.
/// Implemented by:
/// - `WasapiSource` (Windows, microphone and loopback)
pub trait AudioSource: Send {
    /// Whether device construction left the handle usable.
    ///
    /// A handle can be created successfully and still be unusable (buffer-size
    /// negotiation or format conflicts); such handles are closed and reported
    /// as `InitFailed`.
    fn is_initialized(&self) -> bool;

    /// Begin delivering audio. Called once, after `is_initialized` passed.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Block until audio is available and copy interleaved frames into `buf`.
    ///
    /// Returns the number of whole frames written. `Ok(0)` means a transient
    /// underrun, not end of stream. Implementations should return within
    /// roughly one block duration so cancellation is observed promptly.
    fn read(&mut self, buf: &mut [f32]) -> Result<usize, CaptureError>;

    /// Drop audio the device queued while nobody was reading.
    ///
    /// Called before the first read after a pause so the paused interval
    /// never reaches the stream. Sources without their own queue keep the
    /// default no-op.
    fn discard_pending(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Stop and release the device. Idempotent, never fails.
    fn close(&mut self);

    /// Human-readable device description for logs.
    fn description(&self) -> String {
        "audio source".into()
    }
}

/// Factory for platform audio sources.
///
/// Higher-level checks (capability version, grant presence, initialized
/// state) are applied uniformly by `session::open_source`; backends only
/// construct devices.
pub trait CaptureBackend: Send + Sync {
    /// Whether the platform supports playback (loopback) capture at all.
    fn loopback_supported(&self) -> bool;

    /// Construct a microphone source for `config`.
    fn open_microphone(&self, config: &CaptureConfig) -> Result<Box<dyn AudioSource>, CaptureError>;

    /// Construct a loopback source for `config`, activating `grant`.
    fn open_loopback(
        &self,
        config: &CaptureConfig,
        grant: &CaptureGrant,
    ) -> Result<Box<dyn AudioSource>, CaptureError>;
}

/// Owns an opened source and closes it exactly once, on every exit path.
///
/// Closing happens on drop, so panics while reading still release the device.
pub struct OpenSource {
    source: Box<dyn AudioSource>,
    kind: SourceType,
}

impl OpenSource {
    pub fn new(source: Box<dyn AudioSource>, kind: SourceType) -> Self {
        Self { source, kind }
    }

    pub fn kind(&self) -> SourceType {
        self.kind
    }

    pub fn source(&self) -> &dyn AudioSource {
        self.source.as_ref()
    }

    pub fn source_mut(&mut self) -> &mut dyn AudioSource {
        self.source.as_mut()
    }

    pub fn description(&self) -> String {
        self.source.description()
    }
}

impl Drop for OpenSource {
    fn drop(&mut self) {
        log::info!("Closing {}", self.source.description());
        self.source.close();
    }
}
