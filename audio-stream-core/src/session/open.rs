use crate::models::config::{CaptureConfig, SourceType};
use crate::models::error::CaptureError;
use crate::models::grant::CaptureGrant;
use crate::traits::audio_source::{CaptureBackend, OpenSource};

/// Open and start the source `config` asks for.
///
/// Applies the checks every backend shares: loopback needs platform support
/// (`NotSupported`) and a grant (`PermissionDenied`); a device that comes back
/// uninitialized or refuses to start is closed and reported as `InitFailed`.
/// Microphone failures are always reported as `InitFailed`.
pub fn open_source(
    backend: &dyn CaptureBackend,
    config: &CaptureConfig,
    grant: Option<&CaptureGrant>,
) -> Result<OpenSource, CaptureError> {
    let source = match config.source_type {
        SourceType::Microphone => backend.open_microphone(config).map_err(as_init_failed)?,
        SourceType::PlaybackLoopback => {
            if !backend.loopback_supported() {
                return Err(CaptureError::NotSupported);
            }
            let grant = grant.ok_or(CaptureError::PermissionDenied)?;
            backend.open_loopback(config, grant)?
        }
    };

    // From here on the guard closes the device on every early return.
    let mut source = OpenSource::new(source, config.source_type);
    if !source.source().is_initialized() {
        return Err(CaptureError::InitFailed(format!(
            "{} reported an uninitialized state",
            source.description()
        )));
    }
    source.source_mut().start().map_err(as_init_failed)?;

    log::info!(
        "Opened {} ({} Hz, {} ch, block {})",
        source.description(),
        config.sample_rate,
        config.channel_count,
        config.block_size
    );
    Ok(source)
}

fn as_init_failed(error: CaptureError) -> CaptureError {
    match error {
        CaptureError::InitFailed(_) => error,
        other => CaptureError::InitFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;

    fn loopback() -> CaptureConfig {
        CaptureConfig::default()
    }

    fn mic() -> CaptureConfig {
        CaptureConfig {
            source_type: SourceType::Microphone,
            ..Default::default()
        }
    }

    fn grant() -> CaptureGrant {
        CaptureGrant::new((), -1, Vec::new())
    }

    #[test]
    fn loopback_unsupported_opens_nothing() {
        let backend = MockBackend::new().without_loopback();
        let err = open_source(&backend, &loopback(), Some(&grant())).err().unwrap();
        assert_eq!(err, CaptureError::NotSupported);
        assert_eq!(backend.opens(), 0);
    }

    #[test]
    fn loopback_without_grant_is_denied() {
        let backend = MockBackend::new();
        let err = open_source(&backend, &loopback(), None).err().unwrap();
        assert_eq!(err, CaptureError::PermissionDenied);
        assert_eq!(backend.opens(), 0);
    }

    #[test]
    fn microphone_ignores_grant() {
        let backend = MockBackend::new();
        let source = open_source(&backend, &mic(), None).unwrap();
        assert_eq!(source.kind(), SourceType::Microphone);
        assert_eq!(backend.probes()[0].starts(), 1);
    }

    #[test]
    fn uninitialized_handle_is_closed() {
        let backend = MockBackend::new().uninitialized();
        let err = open_source(&backend, &mic(), None).err().unwrap();
        assert!(matches!(err, CaptureError::InitFailed(_)));
        assert_eq!(backend.opens(), 1);
        assert_eq!(backend.closes(), 1);
        assert_eq!(backend.probes()[0].starts(), 0);
    }

    #[test]
    fn microphone_errors_are_init_failures() {
        let backend = MockBackend::new().failing_open(CaptureError::PermissionDenied);
        let err = open_source(&backend, &mic(), None).err().unwrap();
        assert!(matches!(err, CaptureError::InitFailed(_)));
    }

    #[test]
    fn loopback_activation_errors_pass_through() {
        let backend =
            MockBackend::new().failing_open(CaptureError::ProjectionFailed("revoked".into()));
        let err = open_source(&backend, &loopback(), Some(&grant())).err().unwrap();
        assert_eq!(err, CaptureError::ProjectionFailed("revoked".into()));
    }

    #[test]
    fn dropping_open_source_closes_once() {
        let backend = MockBackend::new();
        let source = open_source(&backend, &loopback(), Some(&grant())).unwrap();
        assert_eq!(backend.closes(), 0);
        drop(source);
        assert_eq!(backend.closes(), 1);
    }
}
