use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where captured audio comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[serde(alias = "mic", alias = "capture")]
    Microphone,
    /// Audio mixed for on-device playback. Needs a [`CaptureGrant`](super::grant::CaptureGrant).
    #[serde(rename = "loopback", alias = "playback")]
    PlaybackLoopback,
}

/// Configuration for a capture session. Immutable once the session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Device to capture from (default: playback loopback).
    pub source_type: SourceType,

    /// Channels requested from the device (default: 2). Valid values: 1, 2.
    pub channel_count: u16,

    /// Sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Mono samples per delivered block (default: 1024).
    pub block_size: usize,
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), String> {
        if ![1, 2].contains(&self.channel_count) {
            return Err(format!("unsupported channel count: {}", self.channel_count));
        }
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.block_size == 0 {
            return Err("block size must be positive".into());
        }
        Ok(())
    }

    /// Interleaved samples in one raw read of `block_size` frames.
    pub fn frame_buffer_len(&self) -> usize {
        self.block_size * self.channel_count as usize
    }

    /// Playback duration of one delivered block.
    pub fn block_duration(&self) -> Duration {
        let nanos = self.block_size as u64 * 1_000_000_000 / self.sample_rate.max(1) as u64;
        Duration::from_nanos(nanos)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source_type: SourceType::PlaybackLoopback,
            channel_count: 2,
            sample_rate: 44100,
            block_size: 1024,
        }
    }
}

/// Timing knobs for the capture loop and the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    /// Sleep between state checks while paused.
    pub pause_poll: Duration,

    /// Backoff after a read that returned no frames.
    pub underrun_backoff: Duration,

    /// Upper bound `stop` waits for the loop to exit.
    pub stop_timeout: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            pause_poll: Duration::from_millis(20),
            underrun_backoff: Duration::from_millis(5),
            stop_timeout: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_buffer_len(), 2048);
    }

    #[test]
    fn rejects_bad_channel_counts() {
        for channels in [0u16, 3, 6] {
            let config = CaptureConfig {
                channel_count: channels,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "channels {}", channels);
        }
    }

    #[test]
    fn rejects_zero_rate_and_block() {
        let config = CaptureConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CaptureConfig {
            block_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_host_json() {
        let config: CaptureConfig = serde_json::from_str(
            r#"{"sourceType":"microphone","channelCount":1,"sampleRate":48000,"blockSize":480}"#,
        )
        .unwrap();
        assert_eq!(config.source_type, SourceType::Microphone);
        assert_eq!(config.channel_count, 1);
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.block_size, 480);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: CaptureConfig = serde_json::from_str(r#"{"sourceType":"capture"}"#).unwrap();
        assert_eq!(config.source_type, SourceType::Microphone);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.block_size, 1024);

        let config: CaptureConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.source_type, SourceType::PlaybackLoopback);
    }

    #[test]
    fn block_duration() {
        let config = CaptureConfig {
            sample_rate: 48000,
            block_size: 480,
            ..Default::default()
        };
        assert_eq!(config.block_duration(), Duration::from_millis(10));
    }
}
