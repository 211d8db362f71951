use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::models::config::LoopTiming;
use crate::models::error::CaptureError;
use crate::processing::sample_accumulator::SampleAccumulator;
use crate::traits::audio_source::OpenSource;
use crate::traits::event_sink::EventSink;

const RUNNING: u8 = 0;
const PAUSED: u8 = 1;
const CANCELLED: u8 = 2;

/// Externally visible run state of a capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Paused,
    Cancelled,
}

/// Flags shared between the controller and one capture loop.
///
/// The controller only ever touches these flags, never the audio buffers.
/// Pause and resume take the emission gate, so once `pause` returns no
/// further block is delivered until `resume`, and the state events they
/// announce land between the blocks on either side.
#[derive(Debug)]
pub struct LoopControl {
    state: AtomicU8,
    pauses: AtomicU64,
    gate: Mutex<()>,
    exited: Mutex<bool>,
    exit_cv: Condvar,
}

impl LoopControl {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
            pauses: AtomicU64::new(0),
            gate: Mutex::new(()),
            exited: Mutex::new(false),
            exit_cv: Condvar::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => LoopState::Running,
            PAUSED => LoopState::Paused,
            _ => LoopState::Cancelled,
        }
    }

    /// Running → Paused. Returns false if the loop was not running.
    pub fn pause(&self) -> bool {
        self.pause_then(|| {})
    }

    /// Paused → Running. Returns false if the loop was not paused.
    pub fn resume(&self) -> bool {
        self.resume_then(|| {})
    }

    /// Pause, running `announce` before any further delivery can happen.
    pub fn pause_then<F: FnOnce()>(&self, announce: F) -> bool {
        let _gate = self.gate.lock();
        let changed = self.transition(RUNNING, PAUSED);
        if changed {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            announce();
        }
        changed
    }

    /// Resume, running `announce` before the next block is delivered.
    pub fn resume_then<F: FnOnce()>(&self, announce: F) -> bool {
        let _gate = self.gate.lock();
        let changed = self.transition(PAUSED, RUNNING);
        if changed {
            announce();
        }
        changed
    }

    /// Request exit. Observed at the top of the next cycle.
    pub fn cancel(&self) {
        self.state.store(CANCELLED, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::SeqCst) == CANCELLED
    }

    /// Number of pauses so far. A change means the stream has a gap.
    pub fn pause_count(&self) -> u64 {
        self.pauses.load(Ordering::SeqCst)
    }

    /// Wait until the loop has exited and released its source.
    ///
    /// Returns false if `timeout` elapsed first.
    pub fn wait_exited(&self, timeout: Duration) -> bool {
        let mut exited = self.exited.lock();
        if !*exited {
            let _ = self
                .exit_cv
                .wait_while_for(&mut exited, |done| !*done, timeout);
        }
        *exited
    }

    /// Hold off block delivery, e.g. while the controller announces a start.
    pub(crate) fn hold(&self) -> MutexGuard<'_, ()> {
        self.gate.lock()
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn mark_exited(&self) {
        *self.exited.lock() = true;
        self.exit_cv.notify_all();
    }
}

impl Default for LoopControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a capture loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    Failed(CaptureError),
}

/// Marks the loop as exited when dropped, after the source is released.
struct ExitSignal(Arc<LoopControl>);

impl Drop for ExitSignal {
    fn drop(&mut self) {
        self.0.mark_exited();
    }
}

/// Worker driving `AudioSource::read` → `SampleAccumulator` → `EventSink`.
///
/// Owns the source for the lifetime of the session; the source is closed
/// when the loop returns, whichever branch it leaves through.
pub struct CaptureLoop {
    source: OpenSource,
    accumulator: SampleAccumulator,
    sink: Arc<dyn EventSink>,
    control: Arc<LoopControl>,
    timing: LoopTiming,
    buffer: Vec<f32>,
    blocks_emitted: Arc<AtomicU64>,
    pauses_seen: u64,
}

impl CaptureLoop {
    pub fn new(
        source: OpenSource,
        accumulator: SampleAccumulator,
        sink: Arc<dyn EventSink>,
        control: Arc<LoopControl>,
        timing: LoopTiming,
    ) -> Self {
        let buffer_len = accumulator.block_size() * accumulator.channels();
        let pauses_seen = control.pause_count();
        Self {
            source,
            accumulator,
            sink,
            control,
            timing,
            buffer: vec![0.0; buffer_len],
            blocks_emitted: Arc::new(AtomicU64::new(0)),
            pauses_seen,
        }
    }

    /// Counter of blocks delivered so far, readable from other threads.
    pub fn blocks_emitted(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.blocks_emitted)
    }

    /// Run on a dedicated thread. `on_exit` runs on that thread after the
    /// source is closed and the exit is signalled.
    pub fn spawn<F>(self, on_exit: F) -> std::io::Result<thread::JoinHandle<()>>
    where
        F: FnOnce(LoopExit) + Send + 'static,
    {
        let control = Arc::clone(&self.control);
        thread::Builder::new()
            .name("audio-capture-loop".into())
            .spawn(move || {
                let exit = {
                    let _signal = ExitSignal(control);
                    self.run_guarded()
                };
                on_exit(exit);
            })
    }

    /// Run until cancelled or failed, converting a panic into `CaptureFailed`.
    pub fn run_guarded(self) -> LoopExit {
        let sink = Arc::clone(&self.sink);
        let control = Arc::clone(&self.control);
        match panic::catch_unwind(AssertUnwindSafe(|| self.run())) {
            Ok(exit) => exit,
            Err(_) => {
                let error = CaptureError::CaptureFailed("capture loop panicked".into());
                log::error!("{}", error);
                let _gate = control.gate.lock();
                sink.report(&error);
                LoopExit::Failed(error)
            }
        }
    }

    /// Run on the current thread until cancelled or failed.
    pub fn run(mut self) -> LoopExit {
        log::info!("Capture loop started on {}", self.source.description());
        let mut underruns: u64 = 0;

        loop {
            match self.control.state() {
                LoopState::Cancelled => {
                    log::info!("Capture loop cancelled");
                    return LoopExit::Cancelled;
                }
                LoopState::Paused => {
                    thread::sleep(self.timing.pause_poll);
                    continue;
                }
                LoopState::Running => {}
            }

            let pauses = self.control.pause_count();
            if pauses != self.pauses_seen {
                self.pauses_seen = pauses;
                // Audio the device queued while paused belongs to the pause.
                if let Err(e) = self.source.source_mut().discard_pending() {
                    return self.fail(e);
                }
            }

            let frames = match self.source.source_mut().read(&mut self.buffer) {
                Ok(frames) => frames,
                Err(e) => return self.fail(e),
            };

            if frames == 0 {
                if underruns == 0 {
                    log::warn!("Capture underrun, backing off");
                }
                underruns += 1;
                thread::sleep(self.timing.underrun_backoff);
                continue;
            }
            if underruns > 0 {
                log::debug!("Capture recovered after {} empty reads", underruns);
                underruns = 0;
            }

            let len = (frames * self.accumulator.channels()).min(self.buffer.len());
            self.deliver(len);
        }
    }

    fn fail(&self, e: CaptureError) -> LoopExit {
        log::error!("Capture read failed: {}", e);
        let error = if e.kind().is_mid_stream() {
            e
        } else {
            CaptureError::CaptureFailed(e.to_string())
        };
        // Behind the gate so the error never overtakes `Started`.
        let _gate = self.control.gate.lock();
        self.sink.report(&error);
        LoopExit::Failed(error)
    }

    fn deliver(&mut self, len: usize) {
        let _gate = self.control.gate.lock();
        // Frames that were in flight when pause or cancel landed belong to
        // the paused interval and are dropped.
        let paused_meanwhile = self.control.pause_count() != self.pauses_seen;
        if self.control.state() != LoopState::Running || paused_meanwhile {
            return;
        }
        let sink = &self.sink;
        let emitted = self
            .accumulator
            .push_with(&self.buffer[..len], |block| sink.audio(block));
        self.blocks_emitted.fetch_add(emitted as u64, Ordering::Relaxed);
    }
}
