use std::sync::mpsc;

use crate::models::error::CaptureError;
use crate::models::events::{AudioBlock, CaptureEvent, ErrorEvent};
use crate::models::state::StateEvent;

/// Ordered delivery of audio, state and error events to the host.
///
/// Audio blocks arrive on the capture thread; state and error events arrive
/// on whichever thread issued the command or hit the fault. Calls for one
/// session never overlap out of order. Implementations must not call back into
/// the controller synchronously.
pub trait EventSink: Send + Sync {
    /// A completed mono block.
    fn audio(&self, block: AudioBlock);

    /// A lifecycle transition.
    fn state(&self, event: StateEvent);

    /// A failure, already reduced to a stable reason.
    fn error(&self, event: ErrorEvent);

    fn report(&self, error: &CaptureError) {
        self.error(ErrorEvent::from(error));
    }
}

/// Forwards every event into an `mpsc` channel as a [`CaptureEvent`].
///
/// Events sent after the receiver is gone are dropped.
pub struct ChannelSink {
    tx: mpsc::Sender<CaptureEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::Receiver<CaptureEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: CaptureEvent) {
        if self.tx.send(event).is_err() {
            log::trace!("event receiver dropped");
        }
    }
}

impl EventSink for ChannelSink {
    fn audio(&self, block: AudioBlock) {
        self.send(CaptureEvent::Audio { samples: block });
    }

    fn state(&self, event: StateEvent) {
        self.send(CaptureEvent::State { value: event });
    }

    fn error(&self, event: ErrorEvent) {
        self.send(CaptureEvent::Error(event));
    }
}
