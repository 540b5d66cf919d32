//! Message Types for Thread Communication
//!
//! Commands flow from a control surface -> PlaybackController
//! Events flow from PlaybackController -> any listener

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use resona_dsp::GainVector;

/// Playback state machine
///
/// `Idle -> Loading -> Idle` on load, `Idle -> Playing -> Stopping -> Idle`
/// on playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Stopping,
}

/// Commands accepted by [`PlaybackController::dispatch`](crate::PlaybackController::dispatch)
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Decode a file and keep it as the current buffer
    Load(PathBuf),

    /// Start playback of the loaded buffer
    Play,

    /// Stop playback (no-op when idle)
    Stop,

    /// Set gain for a single band (band_index, gain_db)
    SetGain { band: usize, gain_db: f32 },

    /// Replace all five gains (e.g. a preset from an external store)
    SetGains(GainVector),
}

/// Events sent from the controller to listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// State machine moved
    StateChanged { state: PlaybackState },

    /// A file was decoded and is ready to play
    Loaded {
        path: String,
        sample_rate: u32,
        frames: usize,
    },

    /// The whole buffer was played out
    Finished,

    /// Underruns seen during the session that just ended
    Underruns { events: u64, frames: u64 },

    /// Error occurred
    Error { message: String },
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}
