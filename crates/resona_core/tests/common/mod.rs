//! Fixtures shared by the integration tests
//!
//! WAV files are written with hound into a temporary directory that is
//! removed when the fixture is dropped.

#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::PathBuf;

use tempfile::TempDir;

pub const SAMPLE_RATE: u32 = 44100;

/// Temporary directory holding generated audio files
pub struct Fixtures {
    dir: TempDir,
}

impl Fixtures {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Mono 32-bit float WAV
    pub fn write_f32_wav(&self, name: &str, samples: &[f32]) -> PathBuf {
        let path = self.path(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).expect("Failed to create wav");
        for &s in samples {
            writer.write_sample(s).expect("Failed to write sample");
        }
        writer.finalize().expect("Failed to finalize wav");
        path
    }

    /// 16-bit WAV with `channels` interleaved channels
    pub fn write_i16_wav(&self, name: &str, channels: u16, interleaved: &[i16]) -> PathBuf {
        let path = self.path(name);
        let spec = hound::WavSpec {
            channels,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).expect("Failed to create wav");
        for &s in interleaved {
            writer.write_sample(s).expect("Failed to write sample");
        }
        writer.finalize().expect("Failed to finalize wav");
        path
    }

    pub fn write_bytes(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, bytes).expect("Failed to write file");
        path
    }
}

/// File checked in under `tests/fixtures/`
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn sine(freq: f32, frames: usize, amplitude: f32) -> Vec<f32> {
    (0..frames)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}
