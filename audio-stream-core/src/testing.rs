//! Scripted backend, source and sink used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::models::events::{AudioBlock, CaptureEvent, ErrorEvent};
use crate::models::grant::CaptureGrant;
use crate::models::state::StateEvent;
use crate::traits::audio_source::{AudioSource, CaptureBackend};
use crate::traits::event_sink::EventSink;

/// One scripted outcome of `AudioSource::read`.
#[derive(Debug, Clone)]
pub enum ReadStep {
    /// Interleaved samples to hand back.
    Frames(Vec<f32>),
    Underrun,
    Fail(String),
    Error(CaptureError),
    Panic,
}

/// Counters observed from outside a [`MockSource`].
#[derive(Debug, Clone, Default)]
pub struct SourceProbe {
    reads: Arc<AtomicUsize>,
    starts: Arc<AtomicUsize>,
    discards: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl SourceProbe {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn discards(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }

    /// Every `close` call, repeated ones included.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Frames a device queues while paused, skipped by `discard_pending`.
pub const STALE_FRAMES: u32 = 250;

/// Plays back its script, then produces a live ramp forever.
///
/// The ramp rises by 0.001 per frame; a discard skips [`STALE_FRAMES`]
/// of it, as a device drops its backlog.
pub struct MockSource {
    channels: usize,
    script: VecDeque<ReadStep>,
    initialized: bool,
    discard_fails: bool,
    read_delay: Duration,
    next_value: u32,
    probe: SourceProbe,
}

impl MockSource {
    pub fn scripted(channels: u16, steps: Vec<ReadStep>) -> (Self, SourceProbe) {
        let probe = SourceProbe::default();
        let source = Self {
            channels: channels as usize,
            script: steps.into(),
            initialized: true,
            discard_fails: false,
            read_delay: Duration::from_millis(1),
            next_value: 0,
            probe: probe.clone(),
        };
        (source, probe)
    }

    pub fn fail_discard(&mut self) {
        self.discard_fails = true;
    }

    fn live_frames(&mut self, buf: &mut [f32]) -> usize {
        thread::sleep(self.read_delay);
        let frames = buf.len() / self.channels;
        for frame in buf.chunks_exact_mut(self.channels) {
            let value = (self.next_value % 1000) as f32 / 1000.0;
            self.next_value += 1;
            frame.fill(value);
        }
        frames
    }
}

impl AudioSource for MockSource {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self, buf: &mut [f32]) -> Result<usize, CaptureError> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            None => Ok(self.live_frames(buf)),
            Some(ReadStep::Frames(samples)) => {
                let n = samples.len().min(buf.len());
                buf[..n].copy_from_slice(&samples[..n]);
                Ok(n / self.channels)
            }
            Some(ReadStep::Underrun) => Ok(0),
            Some(ReadStep::Fail(message)) => Err(CaptureError::ReadFailure(message)),
            Some(ReadStep::Error(error)) => Err(error),
            Some(ReadStep::Panic) => panic!("scripted source panic"),
        }
    }

    fn discard_pending(&mut self) -> Result<(), CaptureError> {
        self.probe.discards.fetch_add(1, Ordering::SeqCst);
        if self.discard_fails {
            return Err(CaptureError::ReadFailure("flush failed".into()));
        }
        self.next_value += STALE_FRAMES;
        Ok(())
    }

    fn close(&mut self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn description(&self) -> String {
        "mock source".into()
    }
}

/// Backend handing out [`MockSource`]s and counting constructions.
pub struct MockBackend {
    loopback_supported: bool,
    initialized: bool,
    open_error: Option<CaptureError>,
    script: Vec<ReadStep>,
    read_delay: Duration,
    opens: AtomicUsize,
    probes: Mutex<Vec<SourceProbe>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            loopback_supported: true,
            initialized: true,
            open_error: None,
            script: Vec::new(),
            read_delay: Duration::from_millis(1),
            opens: AtomicUsize::new(0),
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn without_loopback(mut self) -> Self {
        self.loopback_supported = false;
        self
    }

    pub fn uninitialized(mut self) -> Self {
        self.initialized = false;
        self
    }

    pub fn failing_open(mut self, error: CaptureError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn with_script(mut self, steps: Vec<ReadStep>) -> Self {
        self.script = steps;
        self
    }

    /// How long each live read blocks.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Devices constructed so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.probes.lock().iter().map(SourceProbe::closes).sum()
    }

    pub fn probes(&self) -> Vec<SourceProbe> {
        self.probes.lock().clone()
    }

    fn open(&self, config: &CaptureConfig) -> Result<Box<dyn AudioSource>, CaptureError> {
        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (mut source, probe) = MockSource::scripted(config.channel_count, self.script.clone());
        source.initialized = self.initialized;
        source.read_delay = self.read_delay;
        self.probes.lock().push(probe);
        Ok(Box::new(source))
    }
}

impl CaptureBackend for MockBackend {
    fn loopback_supported(&self) -> bool {
        self.loopback_supported
    }

    fn open_microphone(&self, config: &CaptureConfig) -> Result<Box<dyn AudioSource>, CaptureError> {
        self.open(config)
    }

    fn open_loopback(
        &self,
        config: &CaptureConfig,
        _grant: &CaptureGrant,
    ) -> Result<Box<dyn AudioSource>, CaptureError> {
        self.open(config)
    }
}

/// Sink that records every event in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CaptureEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<CaptureEvent> {
        self.events.lock().clone()
    }

    pub fn audio_blocks(&self) -> Vec<AudioBlock> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::Audio { samples } => Some(samples.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<StateEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::State { value } => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<ErrorEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::Error(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    /// Poll until `done` holds or `timeout` elapses.
    pub fn wait_for<F>(&self, timeout: Duration, done: F) -> bool
    where
        F: Fn(&Self) -> bool,
    {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done(self) {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        done(self)
    }
}

impl EventSink for RecordingSink {
    fn audio(&self, block: AudioBlock) {
        self.events.lock().push(CaptureEvent::Audio { samples: block });
    }

    fn state(&self, event: StateEvent) {
        self.events.lock().push(CaptureEvent::State { value: event });
    }

    fn error(&self, event: ErrorEvent) {
        self.events.lock().push(CaptureEvent::Error(event));
    }
}
