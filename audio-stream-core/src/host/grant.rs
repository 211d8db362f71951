use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use crate::models::grant::{CaptureGrant, GrantDenial};
use crate::traits::grant_provider::GrantProvider;

type GrantAnswer = Result<CaptureGrant, GrantDenial>;

/// One-shot answer channel handed to the [`GrantProvider`].
pub struct GrantResponder {
    tx: mpsc::SyncSender<GrantAnswer>,
}

impl GrantResponder {
    pub fn grant(self, grant: CaptureGrant) {
        self.answer(Ok(grant));
    }

    pub fn deny(self) {
        self.answer(Err(GrantDenial::Refused));
    }

    fn answer(self, answer: GrantAnswer) {
        if self.tx.send(answer).is_err() {
            log::debug!("grant answer arrived after the requester gave up");
        }
    }
}

/// The requester's side of an outstanding grant request.
pub struct PendingGrant {
    rx: mpsc::Receiver<GrantAnswer>,
}

impl PendingGrant {
    /// Block until the provider answers or `timeout` elapses.
    pub fn wait(self, timeout: Duration) -> GrantAnswer {
        match self.rx.recv_timeout(timeout) {
            Ok(answer) => answer,
            Err(RecvTimeoutError::Timeout) => Err(GrantDenial::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(GrantDenial::Abandoned),
        }
    }
}

/// Issues grant requests to the platform collaborator.
#[derive(Clone)]
pub struct GrantBroker {
    provider: Arc<dyn GrantProvider>,
}

impl GrantBroker {
    pub fn new(provider: Arc<dyn GrantProvider>) -> Self {
        Self { provider }
    }

    pub fn request(&self) -> PendingGrant {
        let (tx, rx) = mpsc::sync_channel(1);
        self.provider.request(GrantResponder { tx });
        PendingGrant { rx }
    }
}
