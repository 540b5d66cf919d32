//! Resona Core - Playback Engine
//!
//! This crate provides the playback engine for Resona, including:
//! - File decoding to a mono sample buffer (via Symphonia)
//! - A producer thread feeding fixed-size blocks into a lock-free queue
//! - The real-time callback that equalizes each block on its way to the device
//! - Output through CPAL or a headless clock
//! - The PlaybackController state machine and command surface
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Control Thread                         │
//! │  Command ──▶ PlaybackController ──events──▶ crossbeam      │
//! │                 │ decode()     │ set_gain() ─▶ GainStore    │
//! └─────────────────────────────────────────────────────────────┘
//!                   │ Arc<[f32]>                     │ atomics
//!                   ▼                                ▼
//! ┌──────────────────────┐  rtrb   ┌─────────────────────────────┐
//! │   Producer Thread    │ ──────▶ │      Audio Callback         │
//! │ blocks, zero-padded  │ blocks  │ pop ▶ FilterBank ▶ device   │
//! └──────────────────────┘         │ (Zero allocation path)      │
//!                                  └─────────────────────────────┘
//! ```

mod backend;
mod buffer;
mod config;
mod controller;
mod decode;
mod device;
mod error;
mod message;
mod producer;
mod queue;
mod stream;

pub use backend::{CpalBackend, HeadlessBackend, OutputBackend, OutputSpec, OutputStream};
pub use buffer::AudioBuffer;
pub use config::EngineConfig;
pub use controller::PlaybackController;
pub use decode::{decode, SUPPORTED_EXTENSIONS};
pub use device::{list_output_devices, matches_device_name, OutputDevice};
pub use error::{DecodeError, EngineError, EngineResult};
pub use message::{Command, Event, PlaybackState};
pub use producer::{BlockProducer, ProducerReport};
pub use queue::{block_queue, BlockReceiver, BlockSender, Pop, PushError, QueueHandle};
pub use stream::{PlaybackStats, StreamCallback, StreamStats};

// Re-export DSP types for convenience
pub use resona_dsp::{FilterBank, GainStore, GainVector, NUM_BANDS, PRESETS};
