//! Engine Error Types

use std::path::PathBuf;

use thiserror::Error;

use crate::message::PlaybackState;

/// Errors produced while turning a file into an [`AudioBuffer`](crate::AudioBuffer)
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt data: {0}")]
    CorruptData(String),
}

/// Errors that can occur in the playback engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to open output device: {0}")]
    DeviceOpenFailure(String),

    #[error("No audio devices found")]
    NoDevicesFound,

    #[error("Cannot {action} while {from:?}")]
    InvalidStateTransition {
        from: PlaybackState,
        action: &'static str,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    #[error("DSP error: {0}")]
    Dsp(#[from] resona_dsp::DspError),
}

impl EngineError {
    /// Map a rejected band/gain into the command-surface error
    pub(crate) fn invalid_argument(err: resona_dsp::DspError) -> Self {
        EngineError::InvalidArgument(err.to_string())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::DeviceOpenFailure("busy".into());
        assert!(err.to_string().contains("busy"));

        let err = EngineError::InvalidStateTransition {
            from: PlaybackState::Playing,
            action: "play",
        };
        assert!(err.to_string().contains("play"));
        assert!(err.to_string().contains("Playing"));

        let err = DecodeError::FileNotFound(PathBuf::from("/tmp/missing.wav"));
        assert!(err.to_string().contains("missing.wav"));
    }

    #[test]
    fn test_error_from_decode() {
        let engine_err: EngineError = DecodeError::CorruptData("bad header".into()).into();
        assert!(matches!(
            engine_err,
            EngineError::Decode(DecodeError::CorruptData(_))
        ));
    }

    #[test]
    fn test_error_from_dsp() {
        let dsp_err = resona_dsp::DspError::InvalidSampleRate(0.0);
        let engine_err: EngineError = dsp_err.into();
        assert!(matches!(engine_err, EngineError::Dsp(_)));

        let arg_err = EngineError::invalid_argument(resona_dsp::DspError::InvalidBandIndex(5));
        assert!(matches!(arg_err, EngineError::InvalidArgument(_)));
    }
}
