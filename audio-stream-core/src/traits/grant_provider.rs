use crate::host::grant::GrantResponder;

/// External collaborator that asks the platform for a loopback capture grant.
///
/// `request` must return promptly; the answer is delivered later (from any
/// thread) through the responder. Dropping the responder without answering
/// reports the request as abandoned.
pub trait GrantProvider: Send + Sync {
    fn request(&self, responder: GrantResponder);
}
