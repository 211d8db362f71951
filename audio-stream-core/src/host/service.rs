use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::host::command::{Command, CommandOutcome, HostRequest};
use crate::host::grant::GrantBroker;
use crate::models::config::{CaptureConfig, LoopTiming};
use crate::models::error::CaptureError;
use crate::models::grant::{CaptureGrant, GrantDenial};
use crate::session::controller::CaptureSessionController;
use crate::traits::audio_source::CaptureBackend;
use crate::traits::event_sink::EventSink;
use crate::traits::grant_provider::GrantProvider;

/// Default time the host's consent prompt may take.
pub const DEFAULT_GRANT_TIMEOUT: Duration = Duration::from_secs(120);

/// Host-facing entry point: command dispatch, grant bookkeeping and the
/// session controller behind one handle.
pub struct CaptureService {
    controller: CaptureSessionController,
    grants: GrantBroker,
    last_grant: Mutex<Option<CaptureGrant>>,
    grant_timeout: Duration,
}

impl CaptureService {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        sink: Arc<dyn EventSink>,
        provider: Arc<dyn GrantProvider>,
    ) -> Self {
        Self::with_timing(backend, sink, provider, LoopTiming::default())
    }

    pub fn with_timing(
        backend: Arc<dyn CaptureBackend>,
        sink: Arc<dyn EventSink>,
        provider: Arc<dyn GrantProvider>,
        timing: LoopTiming,
    ) -> Self {
        Self {
            controller: CaptureSessionController::with_timing(backend, sink, timing),
            grants: GrantBroker::new(provider),
            last_grant: Mutex::new(None),
            grant_timeout: DEFAULT_GRANT_TIMEOUT,
        }
    }

    pub fn set_grant_timeout(&mut self, timeout: Duration) {
        self.grant_timeout = timeout;
    }

    pub fn controller(&self) -> &CaptureSessionController {
        &self.controller
    }

    /// Ask the platform for a loopback grant and remember it for later starts.
    ///
    /// A grant whose result code is not [`CaptureGrant::RESULT_OK`] counts as
    /// refused and is not remembered.
    pub fn request_capture_grant(&self) -> Result<CaptureGrant, GrantDenial> {
        let answer = match self.grants.request().wait(self.grant_timeout) {
            Ok(grant) if !grant.is_approved() => {
                log::debug!("grant came back with result code {}", grant.result_code());
                Err(GrantDenial::Refused)
            }
            other => other,
        };
        match &answer {
            Ok(grant) => {
                log::info!("Capture grant received");
                *self.last_grant.lock() = Some(grant.clone());
            }
            Err(denial) => log::warn!("Capture grant not obtained: {}", denial),
        }
        answer
    }

    pub fn has_grant(&self) -> bool {
        self.last_grant.lock().is_some()
    }

    /// Forget the remembered grant, e.g. after the platform revoked it.
    pub fn clear_grant(&self) {
        *self.last_grant.lock() = None;
    }

    pub fn start(&self, config: CaptureConfig, grant: Option<CaptureGrant>) -> Result<(), CaptureError> {
        let grant = grant.or_else(|| self.last_grant.lock().clone());
        self.controller.start(config, grant)
    }

    pub fn dispatch(&self, command: Command) -> Result<CommandOutcome, CaptureError> {
        match command {
            Command::RequestCaptureGrant => Ok(match self.request_capture_grant() {
                Ok(_) => CommandOutcome::Granted,
                Err(denial) => CommandOutcome::Denied(denial),
            }),
            Command::Start { config, grant } => {
                self.start(config, grant)?;
                Ok(CommandOutcome::Done)
            }
            Command::Stop => {
                self.controller.stop()?;
                Ok(CommandOutcome::Done)
            }
            Command::Pause => {
                self.controller.pause()?;
                Ok(CommandOutcome::Done)
            }
            Command::Resume => {
                self.controller.resume()?;
                Ok(CommandOutcome::Done)
            }
        }
    }

    /// Decode and dispatch a JSON host request.
    pub fn handle_json(&self, request: &str) -> Result<CommandOutcome, CaptureError> {
        let command = Command::from(HostRequest::from_json(request)?);
        self.dispatch(command)
    }
}
