use crate::models::error::CaptureError;
use crate::models::events::AudioBlock;

/// Downmixes interleaved frames to mono and cuts the result into
/// fixed-size blocks.
///
/// Samples that do not fill a whole block stay pending until later input
/// completes them, so every captured frame is delivered exactly once and in
/// order no matter how read sizes line up with `block_size`.
#[derive(Debug)]
pub struct SampleAccumulator {
    channels: usize,
    block_size: usize,
    pending: Vec<f32>,
}

impl SampleAccumulator {
    pub fn new(channel_count: u16, block_size: usize) -> Result<Self, CaptureError> {
        if ![1, 2].contains(&channel_count) {
            return Err(CaptureError::InvalidConfig(format!(
                "unsupported channel count: {}",
                channel_count
            )));
        }
        if block_size == 0 {
            return Err(CaptureError::InvalidConfig("block size must be positive".into()));
        }
        Ok(Self {
            channels: channel_count as usize,
            block_size,
            pending: Vec::with_capacity(block_size),
        })
    }

    /// Mix one frame down to a single sample.
    ///
    /// Stereo frames average left and right; mono frames pass through.
    #[inline]
    pub fn mix_frame(frame: &[f32]) -> f32 {
        match frame {
            [left, right] => (left + right) * 0.5,
            [mono] => *mono,
            _ => 0.0,
        }
    }

    /// Feed interleaved frames, calling `emit` once per completed block in order.
    ///
    /// A trailing partial frame (fewer than `channels` samples) is dropped;
    /// devices only hand out whole frames.
    pub fn push_with<F>(&mut self, interleaved: &[f32], mut emit: F) -> usize
    where
        F: FnMut(AudioBlock),
    {
        let mut emitted = 0;
        for frame in interleaved.chunks_exact(self.channels) {
            self.pending.push(Self::mix_frame(frame));
            if self.pending.len() == self.block_size {
                let full = std::mem::replace(&mut self.pending, Vec::with_capacity(self.block_size));
                emit(AudioBlock::new(full));
                emitted += 1;
            }
        }
        emitted
    }

    /// Feed interleaved frames and collect the completed blocks.
    pub fn push(&mut self, interleaved: &[f32]) -> Vec<AudioBlock> {
        let mut blocks = Vec::new();
        self.push_with(interleaved, |block| blocks.push(block));
        blocks
    }

    /// Mono samples waiting for the next block.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}
