//! Bounded block queue between the producer thread and the audio callback
//!
//! A single-producer single-consumer `rtrb` ring of `f32` sized to a whole
//! number of blocks. Blocks are committed and read as one chunk, so the
//! consumer never observes a partial block.
//!
//! - Producer side: bounded-wait [`BlockSender::push`]
//! - Consumer side: non-blocking, allocation-free [`BlockReceiver::try_pop_into`]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rtrb::{Consumer, Producer, RingBuffer};

/// Sleep between space checks while the queue is full
const PUSH_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Flags shared by both ends and the controller
#[derive(Debug, Default)]
struct QueueFlags {
    /// Producer will push nothing more
    closed: AtomicBool,
    /// Session is being torn down; remaining blocks are to be discarded
    cancelled: AtomicBool,
}

/// Why a push did not enqueue the block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// No space became available within the timeout
    Full,
    /// The queue was cancelled
    Cancelled,
    /// The consumer has been dropped
    Disconnected,
    /// Block length differs from the queue's block size
    WrongLength,
}

/// Result of a non-blocking pop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pop {
    /// A block was copied into the output slice
    Block,
    /// Nothing queued yet; the producer is still running
    Empty,
    /// Producer finished and every block has been consumed
    Drained,
}

/// Create a queue holding up to `capacity_blocks` blocks of `block_frames` samples
pub fn block_queue(block_frames: usize, capacity_blocks: usize) -> (BlockSender, BlockReceiver) {
    let block_frames = block_frames.max(1);
    let capacity_blocks = capacity_blocks.max(1);
    let (producer, consumer) = RingBuffer::<f32>::new(block_frames * capacity_blocks);
    let flags = Arc::new(QueueFlags::default());

    (
        BlockSender {
            producer,
            block_frames,
            flags: Arc::clone(&flags),
        },
        BlockReceiver {
            consumer,
            block_frames,
            flags,
        },
    )
}

/// Producer end; closes the queue when dropped
pub struct BlockSender {
    producer: Producer<f32>,
    block_frames: usize,
    flags: Arc<QueueFlags>,
}

impl BlockSender {
    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    /// Enqueue one block, waiting at most `timeout` for space
    pub fn push(&mut self, block: &[f32], timeout: Duration) -> Result<(), PushError> {
        if block.len() != self.block_frames {
            return Err(PushError::WrongLength);
        }

        let deadline = Instant::now() + timeout;
        loop {
            if self.flags.cancelled.load(Ordering::Acquire) {
                return Err(PushError::Cancelled);
            }
            if self.producer.is_abandoned() {
                return Err(PushError::Disconnected);
            }

            if self.producer.slots() >= block.len() {
                if let Ok(chunk) = self.producer.write_chunk_uninit(block.len()) {
                    // Commits the whole block at once
                    chunk.fill_from_iter(block.iter().copied());
                    return Ok(());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PushError::Full);
            }
            thread::sleep(PUSH_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Mark the stream as complete; the consumer reports `Drained` once empty
    pub fn close(&self) {
        self.flags.closed.store(true, Ordering::Release);
    }

    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            flags: Arc::clone(&self.flags),
        }
    }
}

impl Drop for BlockSender {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consumer end, owned by the audio callback
pub struct BlockReceiver {
    consumer: Consumer<f32>,
    block_frames: usize,
    flags: Arc<QueueFlags>,
}

impl BlockReceiver {
    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    /// Copy the next block into `out` without blocking or allocating
    ///
    /// `out` must be `block_frames` long; a shorter slice receives a prefix of
    /// the block and the rest of the block is dropped.
    pub fn try_pop_into(&mut self, out: &mut [f32]) -> Pop {
        // Load `closed` before looking at slots so a final push cannot be missed
        let closed = self.flags.closed.load(Ordering::Acquire);
        let available = self.consumer.slots();

        if available < self.block_frames {
            return if closed && available == 0 {
                Pop::Drained
            } else {
                Pop::Empty
            };
        }

        match self.consumer.read_chunk(self.block_frames) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                let n1 = first.len().min(out.len());
                out[..n1].copy_from_slice(&first[..n1]);
                let n2 = second.len().min(out.len() - n1);
                out[n1..n1 + n2].copy_from_slice(&second[..n2]);
                chunk.commit_all();
                Pop::Block
            }
            Err(_) => Pop::Empty,
        }
    }

    /// Drop every queued block, returning how many were discarded
    pub fn discard_all(&mut self) -> usize {
        let available = self.consumer.slots();
        if available == 0 {
            return 0;
        }
        match self.consumer.read_chunk(available) {
            Ok(chunk) => {
                chunk.commit_all();
                available / self.block_frames
            }
            Err(_) => 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.cancelled.load(Ordering::Acquire)
    }

    /// Blocks currently queued
    pub fn queued_blocks(&self) -> usize {
        self.consumer.slots() / self.block_frames
    }
}

/// Control-side view of a queue
#[derive(Debug, Clone)]
pub struct QueueHandle {
    flags: Arc<QueueFlags>,
}

impl QueueHandle {
    /// Wake the producer and tell the consumer to discard what is left
    pub fn cancel(&self) {
        self.flags.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.cancelled.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.flags.closed.load(Ordering::Acquire)
    }
}
