//! WASAPI capture source for microphone and loopback capture.
//!
//! Opens the default endpoint in shared, event-driven mode with the stream
//! auto-converted to the session's float format, and exposes it as a
//! blocking `AudioSource::read`.
//!
//! ## Key Differences between endpoints
//! - Microphone reads the default capture endpoint
//! - Loopback reads the default render endpoint with `AUDCLNT_STREAMFLAGS_LOOPBACK`
//! - DRM-protected audio is silenced in loopback
//! - Loopback delivers nothing while nothing plays; reads then time out as underruns

use std::collections::VecDeque;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::{CreateEventW, WaitForSingleObject};

use audio_stream_core::{AudioSource, CaptureConfig, CaptureError};

use crate::com;
use crate::frames;

/// `WAVE_FORMAT_IEEE_FLOAT` format tag.
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

/// Longest a single read waits for the capture event.
const READ_WAIT_MS: u32 = 100;

/// Which default endpoint a source captures from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Microphone,
    Loopback,
}

/// Event-driven WASAPI capture stream.
pub struct WasapiSource {
    endpoint: Endpoint,
    channels: usize,
    audio_client: Option<IAudioClient>,
    capture_client: Option<IAudioCaptureClient>,
    event: HANDLE,
    staged: VecDeque<f32>,
    started: bool,
    closed: bool,
}

// SAFETY: the COM objects are created in the multithreaded apartment and
// every method touching them first confirms the calling thread is in it
// (`com::ensure_mta`), bailing out otherwise. The source is only ever used
// by one thread at a time.
unsafe impl Send for WasapiSource {}

impl WasapiSource {
    /// Open the default endpoint for `config`.
    ///
    /// Errors before `IAudioClient::Initialize` succeeds are returned as
    /// `InitFailed`, including being called from a single-threaded apartment.
    /// Later setup failures leave the source uninitialized.
    pub fn open(endpoint: Endpoint, config: &CaptureConfig) -> Result<Self, CaptureError> {
        com::ensure_mta()?;

        unsafe {
            let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|e| CaptureError::InitFailed(format!("failed to create enumerator: {}", e)))?;

            // Loopback reads from the render endpoint, not a capture one.
            let flow = match endpoint {
                Endpoint::Microphone => eCapture,
                Endpoint::Loopback => eRender,
            };
            let device = enumerator
                .GetDefaultAudioEndpoint(flow, eConsole)
                .map_err(|e| CaptureError::InitFailed(format!("no default endpoint: {}", e)))?;

            let audio_client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| CaptureError::InitFailed(format!("Activate failed: {}", e)))?;

            let channels = config.channel_count;
            let align = frames::block_align(channels);
            let format = WAVEFORMATEX {
                wFormatTag: WAVE_FORMAT_IEEE_FLOAT,
                nChannels: channels,
                nSamplesPerSec: config.sample_rate,
                nAvgBytesPerSec: config.sample_rate * align as u32,
                nBlockAlign: align,
                wBitsPerSample: 32,
                cbSize: 0,
            };

            let mut default_period: i64 = 0;
            audio_client
                .GetDevicePeriod(Some(&mut default_period), None)
                .map_err(|e| CaptureError::InitFailed(format!("GetDevicePeriod failed: {}", e)))?;
            let buffer_duration = frames::buffer_duration_hns(default_period, config);

            let mut flags = AUDCLNT_STREAMFLAGS_EVENTCALLBACK
                | AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM
                | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY
                | AUDCLNT_STREAMFLAGS_NOPERSIST;
            if endpoint == Endpoint::Loopback {
                flags |= AUDCLNT_STREAMFLAGS_LOOPBACK;
            }

            audio_client
                .Initialize(AUDCLNT_SHAREMODE_SHARED, flags, buffer_duration, 0, &format, None)
                .map_err(|e| CaptureError::InitFailed(format!("IAudioClient::Initialize failed: {}", e)))?;

            let event = CreateEventW(None, false, false, PCWSTR::null())
                .map_err(|e| CaptureError::InitFailed(format!("CreateEventW failed: {}", e)))?;

            let capture_client = match audio_client.SetEventHandle(event) {
                Ok(()) => match audio_client.GetService::<IAudioCaptureClient>() {
                    Ok(client) => Some(client),
                    Err(e) => {
                        log::error!("GetService(IAudioCaptureClient) failed: {}", e);
                        None
                    }
                },
                Err(e) => {
                    log::error!("SetEventHandle failed: {}", e);
                    None
                }
            };

            log::debug!(
                "WASAPI {:?} stream: {} Hz, {} ch, buffer {} hns",
                endpoint,
                config.sample_rate,
                channels,
                buffer_duration
            );

            Ok(Self {
                endpoint,
                channels: channels as usize,
                audio_client: Some(audio_client),
                capture_client,
                event,
                staged: VecDeque::new(),
                started: false,
                closed: false,
            })
        }
    }

    /// Move every queued packet into the staging buffer.
    fn drain_packets(&mut self) -> Result<(), CaptureError> {
        let capture = self
            .capture_client
            .as_ref()
            .ok_or_else(|| CaptureError::ReadFailure("capture client not initialized".into()))?;

        unsafe {
            let mut packet_length = capture
                .GetNextPacketSize()
                .map_err(|e| CaptureError::ReadFailure(format!("GetNextPacketSize failed: {}", e)))?;

            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;

                capture
                    .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                    .map_err(|e| CaptureError::ReadFailure(format!("GetBuffer failed: {}", e)))?;

                let total_samples = num_frames as usize * self.channels;
                if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 || buffer_ptr.is_null() {
                    self.staged.extend(std::iter::repeat(0.0f32).take(total_samples));
                } else {
                    let samples = std::slice::from_raw_parts(buffer_ptr as *const f32, total_samples);
                    self.staged.extend(samples.iter().copied());
                }

                capture
                    .ReleaseBuffer(num_frames)
                    .map_err(|e| CaptureError::ReadFailure(format!("ReleaseBuffer failed: {}", e)))?;

                packet_length = capture
                    .GetNextPacketSize()
                    .map_err(|e| CaptureError::ReadFailure(format!("GetNextPacketSize failed: {}", e)))?;
            }
        }
        Ok(())
    }
}

impl AudioSource for WasapiSource {
    fn is_initialized(&self) -> bool {
        self.capture_client.is_some()
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.started {
            return Ok(());
        }
        let client = self
            .audio_client
            .as_ref()
            .ok_or_else(|| CaptureError::InitFailed("source closed".into()))?;
        com::ensure_mta()?;
        unsafe {
            client
                .Start()
                .map_err(|e| CaptureError::InitFailed(format!("IAudioClient::Start failed: {}", e)))?;
        }
        self.started = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [f32]) -> Result<usize, CaptureError> {
        if self.closed {
            return Err(CaptureError::ReadFailure("source closed".into()));
        }
        com::ensure_mta().map_err(|e| CaptureError::ReadFailure(e.to_string()))?;

        if self.staged.len() < self.channels {
            let wait = unsafe { WaitForSingleObject(self.event, READ_WAIT_MS) };
            if wait == WAIT_TIMEOUT {
                return Ok(0);
            }
            if wait != WAIT_OBJECT_0 {
                return Err(CaptureError::ReadFailure(format!("wait on capture event failed: {:?}", wait)));
            }
            self.drain_packets()?;
        }

        let frames = self.staged.len().min(buf.len()) / self.channels;
        let samples = frames * self.channels;
        for (dst, src) in buf.iter_mut().zip(self.staged.drain(..samples)) {
            *dst = src;
        }
        Ok(frames)
    }

    fn discard_pending(&mut self) -> Result<(), CaptureError> {
        if self.closed || self.capture_client.is_none() {
            return Ok(());
        }
        com::ensure_mta().map_err(|e| CaptureError::ReadFailure(e.to_string()))?;
        self.drain_packets()?;
        let dropped = self.staged.len() / self.channels;
        self.staged.clear();
        log::debug!("Discarded {} frames queued during pause", dropped);
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = com::ensure_mta() {
            // Releasing from another apartment is not allowed; leak instead.
            log::warn!("Leaking WASAPI stream closed from the wrong apartment: {}", e);
            std::mem::forget(self.capture_client.take());
            std::mem::forget(self.audio_client.take());
            return;
        }
        unsafe {
            if let Some(client) = self.audio_client.take() {
                if self.started {
                    if let Err(e) = client.Stop() {
                        log::warn!("IAudioClient::Stop failed during close: {}", e);
                    }
                }
            }
            self.capture_client = None;
            if let Err(e) = CloseHandle(self.event) {
                log::warn!("CloseHandle(capture event) failed: {}", e);
            }
        }
        self.staged.clear();
    }

    fn description(&self) -> String {
        match self.endpoint {
            Endpoint::Microphone => "WASAPI microphone".into(),
            Endpoint::Loopback => "WASAPI loopback".into(),
        }
    }
}

impl Drop for WasapiSource {
    fn drop(&mut self) {
        self.close();
    }
}
