//! Unit conversions between WASAPI's 100-ns reference time and frames.

use audio_stream_core::processing::buffer_size::{capture_buffer_bytes, SAMPLE_WIDTH_BYTES};
use audio_stream_core::CaptureConfig;

/// 100-nanosecond units per second (`REFERENCE_TIME`).
pub const HNS_PER_SEC: i64 = 10_000_000;

/// Frames covered by `hns` at `sample_rate`, rounded up.
pub fn hns_to_frames(hns: i64, sample_rate: u32) -> usize {
    if hns <= 0 {
        return 0;
    }
    let rate = sample_rate as i64;
    ((hns * rate + HNS_PER_SEC - 1) / HNS_PER_SEC) as usize
}

/// Duration of `frames` at `sample_rate`, rounded up.
pub fn frames_to_hns(frames: usize, sample_rate: u32) -> i64 {
    let rate = sample_rate.max(1) as i64;
    (frames as i64 * HNS_PER_SEC + rate - 1) / rate
}

/// Bytes per interleaved frame of 32-bit float audio.
pub fn block_align(channels: u16) -> u16 {
    channels * SAMPLE_WIDTH_BYTES as u16
}

/// Shared-mode buffer duration for a session.
///
/// Two device periods at minimum, and never less than one block.
pub fn buffer_duration_hns(device_period_hns: i64, config: &CaptureConfig) -> i64 {
    let align = block_align(config.channel_count) as usize;
    let platform_min = hns_to_frames(device_period_hns * 2, config.sample_rate) * align;
    let bytes = capture_buffer_bytes(platform_min, config);
    frames_to_hns(bytes / align, config.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_ms_at_48k() {
        assert_eq!(hns_to_frames(100_000, 48000), 480);
        assert_eq!(frames_to_hns(480, 48000), 100_000);
    }

    #[test]
    fn rounds_up_partial_frames() {
        // 10 ms at 44.1 kHz is 441 frames exactly; one more tick needs a frame more.
        assert_eq!(hns_to_frames(100_000, 44100), 441);
        assert_eq!(hns_to_frames(100_001, 44100), 442);
        assert_eq!(hns_to_frames(0, 44100), 0);
    }

    #[test]
    fn float_block_align() {
        assert_eq!(block_align(1), 4);
        assert_eq!(block_align(2), 8);
    }

    #[test]
    fn buffer_never_shorter_than_a_block() {
        let config = CaptureConfig {
            channel_count: 2,
            sample_rate: 48000,
            block_size: 4800,
            ..Default::default()
        };
        // Device period of 10 ms would give 20 ms; the 100 ms block wins.
        assert_eq!(buffer_duration_hns(100_000, &config), 1_000_000);
    }

    #[test]
    fn buffer_covers_two_device_periods() {
        let config = CaptureConfig {
            channel_count: 1,
            sample_rate: 48000,
            block_size: 64,
            ..Default::default()
        };
        assert_eq!(buffer_duration_hns(100_000, &config), 200_000);
    }
}
