use crate::models::config::CaptureConfig;

/// Bytes per captured sample (32-bit float).
pub const SAMPLE_WIDTH_BYTES: usize = 4;

/// Device buffer size for a capture session.
///
/// At least the platform minimum, and at least one full block of raw
/// interleaved frames so a blocking read of one block never starves.
pub fn capture_buffer_bytes(platform_min_bytes: usize, config: &CaptureConfig) -> usize {
    let block_bytes = config.frame_buffer_len() * SAMPLE_WIDTH_BYTES;
    platform_min_bytes.max(block_bytes)
}
