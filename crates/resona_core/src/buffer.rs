//! Decoded audio held in memory

use std::sync::Arc;
use std::time::Duration;

/// Mono, normalized sample buffer produced by [`decode`](crate::decode)
///
/// Samples live behind an `Arc` so a playback session can hand them to the
/// producer thread without copying. The buffer is never mutated after decode.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    source_channels: usize,
    codec: Option<String>,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            source_channels: 1,
            codec: None,
        }
    }

    /// Attach source metadata captured while decoding
    pub(crate) fn with_source(mut self, channels: usize, codec: Option<String>) -> Self {
        self.source_channels = channels;
        self.codec = codec;
        self
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub(crate) fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total sample count (frames, since the buffer is mono)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Channel count of the file before downmixing
    pub fn source_channels(&self) -> usize {
        self.source_channels
    }

    /// Best-effort codec label, e.g. "PCM_S16" or "MP3"
    pub fn codec(&self) -> Option<&str> {
        self.codec.as_deref()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Number of `block_frames` blocks needed to cover the buffer
    pub fn block_count(&self, block_frames: usize) -> usize {
        if block_frames == 0 {
            return 0;
        }
        (self.samples.len() + block_frames - 1) / block_frames
    }
}

/// Copy block `index` of `samples` into `out`, zero-filling past the end
///
/// Returns the number of real (non-padding) samples written.
pub(crate) fn copy_block(samples: &[f32], index: usize, out: &mut [f32]) -> usize {
    let start = index.saturating_mul(out.len()).min(samples.len());
    let end = start.saturating_add(out.len()).min(samples.len());
    let real = end - start;
    out[..real].copy_from_slice(&samples[start..end]);
    out[real..].fill(0.0);
    real
}
