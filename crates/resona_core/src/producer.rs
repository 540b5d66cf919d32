//! Block producer thread
//!
//! Slices the decoded buffer into fixed-size blocks (zero-padding the last
//! one) and feeds them into the [`BlockSender`]. Full-queue waits are bounded
//! and the stop flag is re-checked between attempts, so a stop request is seen
//! within one push timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::buffer::copy_block;
use crate::error::{EngineError, EngineResult};
use crate::queue::{BlockSender, PushError};

/// Summary returned by the producer thread when it exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    pub blocks_total: usize,
    pub blocks_pushed: usize,
    /// Push attempts that timed out on a full queue
    pub full_waits: usize,
    pub stopped_early: bool,
}

/// Handle to a running producer thread
pub struct BlockProducer {
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<ProducerReport>>,
}

impl BlockProducer {
    /// Start producing `samples` into `sender` on a new thread
    pub fn spawn(
        samples: Arc<[f32]>,
        sender: BlockSender,
        push_timeout: Duration,
    ) -> EngineResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let thread_stop = Arc::clone(&stop);
        let thread_finished = Arc::clone(&finished);

        let thread = thread::Builder::new()
            .name("resona-producer".to_string())
            .spawn(move || {
                let report = produce(&samples, sender, push_timeout, &thread_stop);
                thread_finished.store(true, Ordering::Release);
                report
            })
            .map_err(|e| EngineError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            stop,
            finished,
            thread: Some(thread),
        })
    }

    /// Ask the thread to exit at its next check
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether the thread has returned
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Wait for the thread to exit
    pub fn join(mut self) -> ProducerReport {
        self.join_inner()
    }

    fn join_inner(&mut self) -> ProducerReport {
        match self.thread.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                error!("producer thread panicked");
                ProducerReport {
                    stopped_early: true,
                    ..Default::default()
                }
            }),
            None => ProducerReport::default(),
        }
    }
}

impl Drop for BlockProducer {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.signal_stop();
            self.join_inner();
        }
    }
}

/// Producer thread body; the sender is dropped (closing the queue) on return
fn produce(
    samples: &[f32],
    mut sender: BlockSender,
    push_timeout: Duration,
    stop: &AtomicBool,
) -> ProducerReport {
    let block_frames = sender.block_frames();
    let blocks_total = if samples.is_empty() {
        0
    } else {
        (samples.len() + block_frames - 1) / block_frames
    };

    let mut report = ProducerReport {
        blocks_total,
        ..Default::default()
    };
    let mut block = vec![0.0f32; block_frames];

    debug!(blocks_total, block_frames, "producer started");

    'blocks: for index in 0..blocks_total {
        copy_block(samples, index, &mut block);

        loop {
            if stop.load(Ordering::Acquire) {
                report.stopped_early = true;
                break 'blocks;
            }

            match sender.push(&block, push_timeout) {
                Ok(()) => {
                    report.blocks_pushed += 1;
                    break;
                }
                Err(PushError::Full) => report.full_waits += 1,
                Err(PushError::Cancelled) | Err(PushError::Disconnected) => {
                    report.stopped_early = true;
                    break 'blocks;
                }
                Err(PushError::WrongLength) => {
                    error!(block_frames, "producer block length mismatch");
                    report.stopped_early = true;
                    break 'blocks;
                }
            }
        }
    }

    sender.close();
    info!(
        pushed = report.blocks_pushed,
        total = report.blocks_total,
        stopped_early = report.stopped_early,
        "producer finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{block_queue, Pop};
    use std::time::Instant;

    const TIMEOUT: Duration = Duration::from_millis(10);

    #[test]
    fn test_produces_all_blocks_with_padding() {
        let samples: Arc<[f32]> = (1..=10).map(|i| i as f32).collect::<Vec<_>>().into();
        let (tx, mut rx) = block_queue(4, 8);

        let producer = BlockProducer::spawn(samples, tx, TIMEOUT).unwrap();
        let report = producer.join();
        assert_eq!(report.blocks_total, 3);
        assert_eq!(report.blocks_pushed, 3);
        assert!(!report.stopped_early);

        let mut out = [0.0; 4];
        assert_eq!(rx.try_pop_into(&mut out), Pop::Block);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(rx.try_pop_into(&mut out), Pop::Block);
        assert_eq!(rx.try_pop_into(&mut out), Pop::Block);
        assert_eq!(out, [9.0, 10.0, 0.0, 0.0]);
        assert_eq!(rx.try_pop_into(&mut out), Pop::Drained);
    }

    #[test]
    fn test_waits_on_full_queue_then_stops() {
        let samples: Arc<[f32]> = vec![0.5f32; 64].into();
        let (tx, rx) = block_queue(4, 2);

        let producer = BlockProducer::spawn(samples, tx, TIMEOUT).unwrap();
        // Nobody consumes: the producer keeps retrying without dropping data
        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());
        assert_eq!(rx.queued_blocks(), 2);

        let start = Instant::now();
        producer.signal_stop();
        let report = producer.join();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(report.stopped_early);
        assert_eq!(report.blocks_pushed, 2);
        assert!(report.full_waits > 0);
    }

    #[test]
    fn test_empty_buffer_closes_immediately() {
        let samples: Arc<[f32]> = Vec::<f32>::new().into();
        let (tx, mut rx) = block_queue(4, 2);

        let report = BlockProducer::spawn(samples, tx, TIMEOUT).unwrap().join();
        assert_eq!(report.blocks_total, 0);

        let mut out = [0.0; 4];
        assert_eq!(rx.try_pop_into(&mut out), Pop::Drained);
    }

    #[test]
    fn test_drop_stops_thread() {
        let samples: Arc<[f32]> = vec![0.0f32; 1024].into();
        let (tx, _rx) = block_queue(4, 2);

        let producer = BlockProducer::spawn(samples, tx, TIMEOUT).unwrap();
        let start = Instant::now();
        drop(producer);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
