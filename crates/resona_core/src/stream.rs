//! Real-time Stream Callback
//!
//! [`StreamCallback`] is the only code that runs on the device thread. Each
//! invocation pops at most one block and equalizes it with a single gain
//! snapshot. Nothing here may block or allocate: a missing block becomes
//! silence and is counted in [`StreamStats`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use resona_dsp::{FilterBank, GainStore};

use crate::queue::{BlockReceiver, Pop};

/// Diagnostics written by the callback, read by the control thread
///
/// Rust pattern: plain atomics with Relaxed ordering for counters; only the
/// `finished` flag carries Release/Acquire.
#[derive(Debug, Default)]
pub struct StreamStats {
    underrun_events: AtomicU64,
    underrun_frames: AtomicU64,
    rendered_blocks: AtomicU64,
    discarded_blocks: AtomicU64,
    finished: AtomicBool,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// The queue reported `Drained`: every block has been played
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> PlaybackStats {
        PlaybackStats {
            underrun_events: self.underrun_events.load(Ordering::Relaxed),
            underrun_frames: self.underrun_frames.load(Ordering::Relaxed),
            rendered_blocks: self.rendered_blocks.load(Ordering::Relaxed),
            discarded_blocks: self.discarded_blocks.load(Ordering::Relaxed),
        }
    }

    fn record_underrun(&self, frames: usize) {
        self.underrun_events.fetch_add(1, Ordering::Relaxed);
        self.underrun_frames
            .fetch_add(frames as u64, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`StreamStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackStats {
    pub underrun_events: u64,
    pub underrun_frames: u64,
    pub rendered_blocks: u64,
    pub discarded_blocks: u64,
}

/// Renders queued blocks into device buffers
pub struct StreamCallback {
    receiver: BlockReceiver,
    bank: FilterBank,
    gains: Arc<GainStore>,
    stats: Arc<StreamStats>,
    /// Raw block popped from the queue
    block: Vec<f32>,
    /// Equalized block
    rendered: Vec<f32>,
}

impl StreamCallback {
    /// All buffers are sized here; `render*` never allocates
    pub fn new(
        receiver: BlockReceiver,
        bank: FilterBank,
        gains: Arc<GainStore>,
        stats: Arc<StreamStats>,
    ) -> Self {
        let block_frames = receiver.block_frames();
        Self {
            receiver,
            bank,
            gains,
            stats,
            block: vec![0.0; block_frames],
            rendered: vec![0.0; block_frames],
        }
    }

    pub fn block_frames(&self) -> usize {
        self.block.len()
    }

    pub fn sample_rate(&self) -> f32 {
        self.bank.sample_rate()
    }

    pub fn stats(&self) -> &Arc<StreamStats> {
        &self.stats
    }

    /// Fill a mono device buffer
    ///
    /// One block is consumed per call. If `out` is longer than a block the
    /// remainder is zero-padded; if shorter, the block tail is dropped.
    pub fn render(&mut self, out: &mut [f32]) {
        let valid = self.next_block(out.len());
        let n = valid.min(out.len());
        out[..n].copy_from_slice(&self.rendered[..n]);
        out[n..].fill(0.0);
    }

    /// Fill an interleaved device buffer of any sample type, duplicating the
    /// mono signal to every channel
    pub fn render_interleaved<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        let channels = channels.max(1);
        let frames = data.len() / channels;
        let valid = self.next_block(frames);

        for (i, frame) in data.chunks_mut(channels).enumerate() {
            let sample = if i < valid { self.rendered[i] } else { 0.0 };
            frame.fill(<T as cpal::Sample>::from_sample::<f32>(sample));
        }
    }

    /// Produce the next block into `self.rendered`, returning how many of its
    /// samples are audio (0 means silence)
    fn next_block(&mut self, requested_frames: usize) -> usize {
        if requested_frames == 0 {
            return 0;
        }

        if self.receiver.is_cancelled() {
            let discarded = self.receiver.discard_all();
            if discarded > 0 {
                self.stats
                    .discarded_blocks
                    .fetch_add(discarded as u64, Ordering::Relaxed);
            }
            return 0;
        }

        match self.receiver.try_pop_into(&mut self.block) {
            Pop::Block => {
                // One snapshot for the whole block
                let gains = self.gains.snapshot();
                match self.bank.apply_into(&self.block, &gains, &mut self.rendered) {
                    Ok(()) => {
                        self.stats.rendered_blocks.fetch_add(1, Ordering::Relaxed);
                        self.rendered.len()
                    }
                    Err(_) => 0,
                }
            }
            Pop::Empty => {
                self.stats.record_underrun(requested_frames);
                0
            }
            Pop::Drained => {
                self.stats.finished.store(true, Ordering::Release);
                0
            }
        }
    }
}
