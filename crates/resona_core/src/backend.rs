//! Output Backends
//!
//! An [`OutputBackend`] turns a [`StreamCallback`] into a running stream.
//! [`CpalBackend`] drives it from a real output device; [`HeadlessBackend`]
//! drives it from a clock thread at the same cadence, with no device.
//!
//! In both cases `close()` returns only after the callback has stopped being
//! invoked, so the controller can safely tear down the session afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::device::{pick_buffer_size, pick_device, pick_output_config};
use crate::error::{EngineError, EngineResult};
use crate::message::Event;
use crate::stream::StreamCallback;

/// What the stream has to play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    pub sample_rate: u32,
    pub block_frames: usize,
}

impl OutputSpec {
    /// Wall time covered by one block
    pub fn block_period(&self) -> Duration {
        Duration::from_secs_f64(self.block_frames as f64 / self.sample_rate.max(1) as f64)
    }
}

/// A running output stream
pub trait OutputStream {
    /// Stop the stream and wait until the callback is no longer running
    fn close(self: Box<Self>);
}

/// Something that can open an output stream
pub trait OutputBackend {
    /// Start invoking `callback` at the device cadence
    ///
    /// Out-of-band stream errors are reported as [`Event::Error`] on `events`.
    fn open(
        &self,
        spec: OutputSpec,
        callback: StreamCallback,
        events: Sender<Event>,
    ) -> EngineResult<Box<dyn OutputStream>>;

    fn name(&self) -> &str;
}

/// Plays through a cpal output device
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    /// Case-insensitive name filter, `None` = host default
    device: Option<String>,
}

impl CpalBackend {
    pub fn new(device: Option<String>) -> Self {
        Self { device }
    }
}

impl OutputBackend for CpalBackend {
    fn open(
        &self,
        spec: OutputSpec,
        callback: StreamCallback,
        events: Sender<Event>,
    ) -> EngineResult<Box<dyn OutputStream>> {
        let host = cpal::default_host();
        let device = pick_device(&host, self.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());

        let supported = pick_output_config(&device, spec.sample_rate)?;
        let channels = supported.channels();
        let buffer_size = pick_buffer_size(supported.buffer_size(), spec.block_frames);
        if buffer_size == cpal::BufferSize::Default {
            warn!(
                block_frames = spec.block_frames,
                "device cannot use the block size as its buffer size; blocks will be padded or truncated"
            );
        }

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size,
        };

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, callback, events),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, callback, events),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, callback, events),
            other => Err(EngineError::DeviceOpenFailure(format!(
                "unsupported sample format {other:?}"
            ))),
        }?;

        stream
            .play()
            .map_err(|e| EngineError::DeviceOpenFailure(e.to_string()))?;

        info!(
            device = %device_name,
            sample_rate = spec.sample_rate,
            channels,
            format = ?supported.sample_format(),
            "output stream started"
        );

        Ok(Box::new(CpalStream { stream }))
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut callback: StreamCallback,
    events: Sender<Event>,
) -> EngineResult<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // Real-time audio callback - NO allocations allowed here
                callback.render_interleaved(data, channels);
            },
            move |err| {
                let _ = events.try_send(Event::error(err));
            },
            None,
        )
        .map_err(|e| EngineError::DeviceOpenFailure(e.to_string()))
}

struct CpalStream {
    stream: cpal::Stream,
}

impl OutputStream for CpalStream {
    fn close(self: Box<Self>) {
        if let Err(e) = self.stream.pause() {
            debug!("pause before close failed: {e}");
        }
        // Dropping the stream stops the device callback
        drop(self.stream);
    }
}

/// Drives the callback from a clock thread instead of a device
///
/// Each tick renders one device buffer of `device_frames` samples (the block
/// size unless overridden) and forwards a copy to the tap, if any.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    tap: Option<Sender<Vec<f32>>>,
    device_frames: Option<usize>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive a copy of every rendered buffer
    pub fn with_tap(mut self, tap: Sender<Vec<f32>>) -> Self {
        self.tap = Some(tap);
        self
    }

    /// Request buffers of `frames` instead of the block size
    pub fn with_device_frames(mut self, frames: usize) -> Self {
        self.device_frames = Some(frames.max(1));
        self
    }
}

impl OutputBackend for HeadlessBackend {
    fn open(
        &self,
        spec: OutputSpec,
        mut callback: StreamCallback,
        _events: Sender<Event>,
    ) -> EngineResult<Box<dyn OutputStream>> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let tap = self.tap.clone();
        let frames = self.device_frames.unwrap_or(spec.block_frames);
        let period = Duration::from_secs_f64(frames as f64 / spec.sample_rate.max(1) as f64);

        let thread = thread::Builder::new()
            .name("resona-headless-clock".to_string())
            .spawn(move || {
                let mut out = vec![0.0f32; frames];
                let mut next_tick = Instant::now();

                while !thread_stop.load(Ordering::Acquire) {
                    callback.render(&mut out);
                    if let Some(tap) = &tap {
                        let _ = tap.send(out.clone());
                    }

                    next_tick += period;
                    let now = Instant::now();
                    if next_tick > now {
                        thread::sleep(next_tick - now);
                    } else {
                        // Fell behind; do not try to catch up in a burst
                        next_tick = now;
                    }
                }
            })
            .map_err(|e| EngineError::ThreadSpawn(e.to_string()))?;

        info!(
            sample_rate = spec.sample_rate,
            frames, "headless output started"
        );

        Ok(Box::new(HeadlessStream {
            stop,
            thread: Some(thread),
        }))
    }

    fn name(&self) -> &str {
        "headless"
    }
}

struct HeadlessStream {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HeadlessStream {
    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("headless clock thread panicked");
            }
        }
    }
}

impl OutputStream for HeadlessStream {
    fn close(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl Drop for HeadlessStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}
