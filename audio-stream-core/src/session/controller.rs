use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::config::{CaptureConfig, LoopTiming};
use crate::models::error::CaptureError;
use crate::models::grant::CaptureGrant;
use crate::models::state::{SessionState, StateEvent};
use crate::processing::sample_accumulator::SampleAccumulator;
use crate::session::capture_loop::{CaptureLoop, LoopControl, LoopExit};
use crate::session::open::open_source;
use crate::traits::audio_source::CaptureBackend;
use crate::traits::event_sink::EventSink;
use crate::traits::presenter::{PresentationState, StatusPresenter};

/// Read-only description of the active session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub id: Uuid,
    pub config: CaptureConfig,
    pub started_at: DateTime<Utc>,
    pub blocks_emitted: u64,
}

/// The one live session. Owned by the command boundary.
struct ActiveSession {
    id: Uuid,
    control: Arc<LoopControl>,
    handle: Option<thread::JoinHandle<()>>,
    block_duration: Duration,
    // Cancelled, but the loop still holds its source.
    releasing: bool,
}

/// What queries see, published after every transition.
struct Published {
    state: SessionState,
    session: Option<PublishedSession>,
}

struct PublishedSession {
    id: Uuid,
    config: CaptureConfig,
    started_at: DateTime<Utc>,
    blocks_emitted: Arc<AtomicU64>,
}

struct Shared {
    backend: Arc<dyn CaptureBackend>,
    sink: Arc<dyn EventSink>,
    timing: LoopTiming,
    // Command boundary: start/stop/pause/resume and fault cleanup hold this
    // for their whole transition.
    commands: Mutex<Option<ActiveSession>>,
    published: Mutex<Published>,
}

/// State machine owning at most one capture session.
///
/// ```text
/// [command] → Controller → open_source → CaptureLoop thread
///                                           ↓
///                        SampleAccumulator → EventSink
/// ```
///
/// Commands are serialized, so concurrent `start` calls open one device and
/// a `stop` racing a `start` cannot orphan a source. A fault inside the loop
/// reports one error, then the controller cleans up as for `stop` and reports
/// `Stopped`.
pub struct CaptureSessionController {
    shared: Arc<Shared>,
}

impl CaptureSessionController {
    pub fn new(backend: Arc<dyn CaptureBackend>, sink: Arc<dyn EventSink>) -> Self {
        Self::with_timing(backend, sink, LoopTiming::default())
    }

    pub fn with_timing(
        backend: Arc<dyn CaptureBackend>,
        sink: Arc<dyn EventSink>,
        timing: LoopTiming,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                sink,
                timing,
                commands: Mutex::new(None),
                published: Mutex::new(Published {
                    state: SessionState::Idle,
                    session: None,
                }),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.published.lock().state
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        let published = self.shared.published.lock();
        published.session.as_ref().map(|s| SessionInfo {
            id: s.id,
            config: s.config.clone(),
            started_at: s.started_at,
            blocks_emitted: s.blocks_emitted.load(Ordering::Relaxed),
        })
    }

    /// Start a session. No-op (returning `Ok`) if one is already active.
    ///
    /// Transitions: idle → starting → recording, or back to idle on failure.
    /// Failures emit one error event and leave no device open.
    pub fn start(&self, config: CaptureConfig, grant: Option<CaptureGrant>) -> Result<(), CaptureError> {
        let shared = &self.shared;
        let mut slot = shared.commands.lock();
        match slot.as_ref() {
            Some(session) if session.releasing => {
                log::warn!("start ignored: session {} is still releasing its device", session.id);
                return Ok(());
            }
            Some(_) => {
                log::debug!("start ignored: session already active");
                return Ok(());
            }
            None => {}
        }

        if let Err(reason) = config.validate() {
            return Err(shared.fail_start(CaptureError::InvalidConfig(reason)));
        }

        shared.set_state(SessionState::Starting);

        let source = match open_source(shared.backend.as_ref(), &config, grant.as_ref()) {
            Ok(source) => source,
            Err(e) => return Err(shared.fail_start(e)),
        };
        let accumulator = match SampleAccumulator::new(config.channel_count, config.block_size) {
            Ok(acc) => acc,
            Err(e) => return Err(shared.fail_start(e)),
        };

        let id = Uuid::new_v4();
        let control = Arc::new(LoopControl::new());
        let capture = CaptureLoop::new(
            source,
            accumulator,
            Arc::clone(&shared.sink),
            Arc::clone(&control),
            shared.timing,
        );
        let blocks_emitted = capture.blocks_emitted();
        let block_duration = config.block_duration();

        // Nothing reaches the sink before `Started` does.
        let gate = control.hold();
        let weak: Weak<Shared> = Arc::downgrade(shared);
        let handle = match capture.spawn(move |exit| {
            if let Some(shared) = weak.upgrade() {
                shared.loop_exited(id, &exit);
            }
        }) {
            Ok(handle) => handle,
            Err(e) => {
                drop(gate);
                let error = CaptureError::CaptureFailed(format!("failed to spawn capture loop: {}", e));
                return Err(shared.fail_start(error));
            }
        };

        *slot = Some(ActiveSession {
            id,
            control: Arc::clone(&control),
            handle: Some(handle),
            block_duration,
            releasing: false,
        });
        {
            let mut published = shared.published.lock();
            published.state = SessionState::Recording;
            published.session = Some(PublishedSession {
                id,
                config,
                started_at: Utc::now(),
                blocks_emitted,
            });
        }
        log::info!("Capture session {} started", id);
        shared.sink.state(StateEvent::Started);
        drop(gate);
        Ok(())
    }

    /// Stop the active session. Safe no-op when idle.
    ///
    /// Transitions: recording/paused → stopping → idle. If the loop is still
    /// blocked in a read when the wait runs out, the controller stays in
    /// `Stopping` (refusing `start`) until the loop has closed its source.
    pub fn stop(&self) -> Result<(), CaptureError> {
        let mut slot = self.shared.commands.lock();
        if slot.is_some() {
            self.shared.finish(&mut slot);
        } else {
            log::debug!("stop ignored: no active session");
        }
        Ok(())
    }

    /// Pause delivery. Transitions: recording → paused; otherwise no-op.
    pub fn pause(&self) -> Result<(), CaptureError> {
        let slot = self.shared.commands.lock();
        let Some(session) = slot.as_ref() else {
            log::debug!("pause ignored: no active session");
            return Ok(());
        };
        let shared = &self.shared;
        let paused = self.state().is_recording()
            && session.control.pause_then(|| {
                shared.set_state(SessionState::Paused);
                shared.sink.state(StateEvent::Paused);
            });
        if paused {
            log::info!("Capture session {} paused", session.id);
        } else {
            log::debug!("pause ignored in state {:?}", self.state());
        }
        Ok(())
    }

    /// Resume delivery. Transitions: paused → recording; otherwise no-op.
    pub fn resume(&self) -> Result<(), CaptureError> {
        let slot = self.shared.commands.lock();
        let Some(session) = slot.as_ref() else {
            log::debug!("resume ignored: no active session");
            return Ok(());
        };
        let shared = &self.shared;
        let resumed = self.state().is_paused()
            && session.control.resume_then(|| {
                shared.set_state(SessionState::Recording);
                shared.sink.state(StateEvent::Resumed);
            });
        if resumed {
            log::info!("Capture session {} resumed", session.id);
        } else {
            log::debug!("resume ignored in state {:?}", self.state());
        }
        Ok(())
    }

    /// Current `(is_recording, is_paused)` for the status display.
    pub fn refresh_presentation(&self) -> PresentationState {
        let state = self.state();
        PresentationState {
            is_recording: state.has_session(),
            is_paused: state.is_paused(),
        }
    }

    /// Render the status display for the current state.
    pub fn present<P: StatusPresenter>(&self, presenter: &P) -> P::Output {
        let view = self.refresh_presentation();
        presenter.render(view.is_recording, view.is_paused)
    }
}

impl Drop for CaptureSessionController {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        self.published.lock().state = state;
    }

    /// Report a failed start and fall back to idle.
    fn fail_start(&self, error: CaptureError) -> CaptureError {
        self.set_state(SessionState::Idle);
        log::error!("Capture start failed: {}", error);
        self.sink.report(&error);
        error
    }

    /// Cancel the loop, wait for it to release the source, and go idle.
    ///
    /// Caller holds the command lock. The wait covers at least two block
    /// durations, since a read may legitimately block for one. The loop
    /// thread is never joined while it might still need that lock; after
    /// the exit signal only its exit hook can remain, which either finds the
    /// session gone or completes a stop left releasing.
    fn finish(&self, slot: &mut Option<ActiveSession>) {
        let Some(session) = slot.as_mut() else {
            return;
        };
        self.set_state(SessionState::Stopping);
        session.control.cancel();

        let wait = self.timing.stop_timeout.max(session.block_duration * 2);
        if !session.control.wait_exited(wait) {
            log::warn!(
                "Capture loop for session {} did not exit within {:?}; stop completes when it does",
                session.id,
                wait
            );
            session.releasing = true;
            return;
        }
        if let Some(handle) = session.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }

        let id = session.id;
        *slot = None;
        {
            let mut published = self.published.lock();
            published.state = SessionState::Idle;
            published.session = None;
        }
        log::info!("Capture session {} stopped", id);
        self.sink.state(StateEvent::Stopped);
    }

    /// Exit hook of the loop of session `id`, run after its source is closed.
    ///
    /// Completes a stop that outlived its wait, or cleans up after a fault.
    fn loop_exited(&self, id: Uuid, exit: &LoopExit) {
        let mut slot = self.commands.lock();
        let pending = match slot.as_ref() {
            Some(session) if session.id == id => {
                session.releasing || matches!(exit, LoopExit::Failed(_))
            }
            // Already stopped (or replaced) by an explicit command.
            _ => false,
        };
        if pending {
            self.finish(&mut slot);
        }
    }
}
