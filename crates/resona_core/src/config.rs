//! Engine Configuration

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Overall engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Block length in frames; the unit of transfer between producer and callback
    pub block_frames: usize,

    /// Block queue capacity in blocks (bounds playback latency)
    pub queue_blocks: usize,

    /// Bounded wait of a single producer push attempt
    pub push_timeout_ms: u64,

    /// Output device name filter (case-insensitive substring), `None` = host default
    pub output_device: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_frames: 1024,
            // 4 blocks worth of queue capacity
            queue_blocks: 4,
            push_timeout_ms: 50,
            output_device: None,
        }
    }
}

impl EngineConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            block_frames: 256, // ~5.8ms per block at 44.1kHz
            queue_blocks: 4,
            ..Self::default()
        }
    }

    /// Create config optimized for stability
    pub fn stable() -> Self {
        Self {
            block_frames: 2048, // ~46ms per block at 44.1kHz
            queue_blocks: 8,
            ..Self::default()
        }
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Bounded producer wait as a [`Duration`]
    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }

    /// Worst-case queued audio in milliseconds at `sample_rate`
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.block_frames * self.queue_blocks) as f32 / sample_rate as f32 * 1000.0
    }

    /// Validate configuration
    pub fn validate(&self) -> EngineResult<()> {
        if !(32..=16384).contains(&self.block_frames) {
            return Err(EngineError::Config(format!(
                "Invalid block size: {}",
                self.block_frames
            )));
        }
        if !(2..=64).contains(&self.queue_blocks) {
            return Err(EngineError::Config(format!(
                "Invalid queue length: {}",
                self.queue_blocks
            )));
        }
        if self.push_timeout_ms == 0 {
            return Err(EngineError::Config("Push timeout must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.block_frames, 1024);
        assert_eq!(config.queue_blocks, 4);
        assert_eq!(config.push_timeout(), Duration::from_millis(50));
        assert!(config.output_device.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_latency_calculation() {
        let config = EngineConfig {
            block_frames: 441,
            queue_blocks: 4,
            ..Default::default()
        };
        // 4 * 441 frames at 44.1kHz = 40ms
        assert!((config.latency_ms(44100) - 40.0).abs() < 0.01);
    }

    #[test]
    fn test_validation() {
        let invalid_block = EngineConfig {
            block_frames: 10,
            ..Default::default()
        };
        assert!(invalid_block.validate().is_err());

        let invalid_queue = EngineConfig {
            queue_blocks: 1,
            ..Default::default()
        };
        assert!(invalid_queue.validate().is_err());

        let invalid_timeout = EngineConfig {
            push_timeout_ms: 0,
            ..Default::default()
        };
        assert!(invalid_timeout.validate().is_err());
    }

    #[test]
    fn test_preset_configs() {
        let low_latency = EngineConfig::low_latency();
        let stable = EngineConfig::stable();

        assert!(low_latency.validate().is_ok());
        assert!(stable.validate().is_ok());
        assert!(low_latency.latency_ms(48000) < stable.latency_ms(48000));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "block_frames": 512 }"#).unwrap();
        assert_eq!(config.block_frames, 512);
        assert_eq!(config.queue_blocks, 4);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resona.json");
        fs::write(&path, r#"{ "queue_blocks": 8, "output_device": "usb" }"#).unwrap();

        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.queue_blocks, 8);
        assert_eq!(config.output_device.as_deref(), Some("usb"));

        fs::write(&path, r#"{ "block_frames": 1 }"#).unwrap();
        assert!(matches!(
            EngineConfig::from_json_file(&path),
            Err(EngineError::Config(_))
        ));

        assert!(EngineConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
