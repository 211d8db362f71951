use serde::Deserialize;

use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::models::grant::{CaptureGrant, GrantDenial};

/// Every command the host can issue.
#[derive(Debug, Clone)]
pub enum Command {
    RequestCaptureGrant,
    Start {
        config: CaptureConfig,
        /// Falls back to the last granted grant when `None`.
        grant: Option<CaptureGrant>,
    },
    Stop,
    Pause,
    Resume,
}

/// Successful result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    Granted,
    Denied(GrantDenial),
}

/// Host request as it arrives over a method channel.
///
/// ```text
/// {"method":"requestProjection"}
/// {"method":"startRecording","config":{"sourceType":"microphone","channelCount":1}}
/// {"method":"stopRecording"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum HostRequest {
    #[serde(alias = "requestCaptureGrant")]
    RequestProjection,
    #[serde(alias = "start")]
    StartRecording {
        #[serde(default)]
        config: CaptureConfig,
    },
    #[serde(alias = "stop")]
    StopRecording,
    #[serde(alias = "pause")]
    PauseRecording,
    #[serde(alias = "resume")]
    ResumeRecording,
}

impl HostRequest {
    /// Decode a request. Unknown methods and malformed configs are rejected
    /// here, before anything reaches the controller.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let request: HostRequest = serde_json::from_str(json)
            .map_err(|e| CaptureError::InvalidConfig(format!("bad host request: {}", e)))?;
        if let HostRequest::StartRecording { config } = &request {
            config.validate().map_err(CaptureError::InvalidConfig)?;
        }
        Ok(request)
    }
}

impl From<HostRequest> for Command {
    fn from(request: HostRequest) -> Self {
        match request {
            HostRequest::RequestProjection => Command::RequestCaptureGrant,
            HostRequest::StartRecording { config } => Command::Start { config, grant: None },
            HostRequest::StopRecording => Command::Stop,
            HostRequest::PauseRecording => Command::Pause,
            HostRequest::ResumeRecording => Command::Resume,
        }
    }
}
