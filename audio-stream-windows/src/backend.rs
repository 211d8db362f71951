use audio_stream_core::{AudioSource, CaptureBackend, CaptureConfig, CaptureError, CaptureGrant};

use crate::capabilities;
use crate::wasapi_source::{Endpoint, WasapiSource};

/// `CaptureBackend` over the default WASAPI endpoints.
///
/// WASAPI loopback itself needs no OS permission; the grant is the host's
/// record that the user agreed to playback capture, and must be present.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasapiBackend;

impl WasapiBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for WasapiBackend {
    fn loopback_supported(&self) -> bool {
        let supported = capabilities::loopback_supported();
        if !supported {
            log::warn!(
                "Loopback capture needs Windows build {} or later (found {:?})",
                capabilities::LOOPBACK_MIN_BUILD,
                capabilities::os_build_number()
            );
        }
        supported
    }

    fn open_microphone(&self, config: &CaptureConfig) -> Result<Box<dyn AudioSource>, CaptureError> {
        Ok(Box::new(WasapiSource::open(Endpoint::Microphone, config)?))
    }

    fn open_loopback(
        &self,
        config: &CaptureConfig,
        grant: &CaptureGrant,
    ) -> Result<Box<dyn AudioSource>, CaptureError> {
        log::debug!("Opening loopback under grant (result code {})", grant.result_code());
        Ok(Box::new(WasapiSource::open(Endpoint::Loopback, config)?))
    }
}
