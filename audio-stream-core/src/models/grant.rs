use std::fmt;
use std::sync::Arc;

/// Proof that the platform granted playback (loopback) capture.
///
/// The token is opaque to this crate; only the backend that activates the
/// grant knows what it holds. `result_code` and `payload` are the two
/// activation fields the platform returned alongside it.
#[derive(Clone)]
pub struct CaptureGrant {
    token: Arc<dyn std::any::Any + Send + Sync>,
    result_code: i32,
    payload: Vec<u8>,
}

impl CaptureGrant {
    /// Result code of an approved consent prompt.
    pub const RESULT_OK: i32 = -1;

    pub fn new<T>(token: T, result_code: i32, payload: Vec<u8>) -> Self
    where
        T: std::any::Any + Send + Sync,
    {
        Self {
            token: Arc::new(token),
            result_code,
            payload,
        }
    }

    pub fn result_code(&self) -> i32 {
        self.result_code
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the platform reported the prompt as approved.
    pub fn is_approved(&self) -> bool {
        self.result_code == Self::RESULT_OK
    }

    /// Borrow the platform token, if it is of type `T`.
    pub fn token<T: std::any::Any>(&self) -> Option<&T> {
        self.token.downcast_ref::<T>()
    }
}

impl fmt::Debug for CaptureGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureGrant")
            .field("result_code", &self.result_code)
            .field("payload_len", &self.payload.len())
            .finish_non_exhaustive()
    }
}

/// Why a grant request did not produce a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantDenial {
    /// The user or platform refused.
    Refused,
    /// The provider dropped the request without answering.
    Abandoned,
    /// No answer arrived within the caller's deadline.
    TimedOut,
}

impl fmt::Display for GrantDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Refused => "refused",
            Self::Abandoned => "abandoned",
            Self::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_downcast() {
        let grant = CaptureGrant::new(42u64, -1, vec![1, 2, 3]);
        assert_eq!(grant.token::<u64>(), Some(&42));
        assert!(grant.token::<String>().is_none());
        assert_eq!(grant.result_code(), -1);
        assert_eq!(grant.payload(), &[1, 2, 3]);
        assert!(grant.is_approved());
        assert!(!CaptureGrant::new((), 0, Vec::new()).is_approved());
    }

    #[test]
    fn debug_hides_payload() {
        let grant = CaptureGrant::new((), 0, vec![0xAA; 16]);
        let text = format!("{:?}", grant);
        assert!(text.contains("payload_len: 16"));
        assert!(!text.contains("170"));
    }
}
