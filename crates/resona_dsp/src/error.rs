//! DSP Error Types

use thiserror::Error;

/// Errors that can occur during DSP operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Invalid band index: {0} (must be 0-4)")]
    InvalidBandIndex(usize),

    #[error("Invalid gain: {0} dB (must be within -50..=50)")]
    InvalidGain(f32),

    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("Block size mismatch: expected {expected}, got {got}")]
    BlockSizeMismatch { expected: usize, got: usize },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),
}

/// Result type alias for DSP operations
pub type DspResult<T> = Result<T, DspError>;
