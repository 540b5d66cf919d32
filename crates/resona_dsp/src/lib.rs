//! Resona DSP - Digital Signal Processing Module
//!
//! This crate provides the equalization stage for Resona:
//! - 5-band resonant peak filter bank (100 Hz, 300 Hz, 1 kHz, 3 kHz, 10 kHz, Q = 1)
//! - Validated gain vectors and built-in presets
//! - Lock-free gain storage shared with the audio callback
//!
//! # Architecture
//!
//! The DSP stage follows a strict "no allocation in audio callback" rule.
//! Filter coefficients are designed once per sample rate; the only per-call
//! input besides the block is a [`GainVector`] snapshot.

mod eq;
mod error;
mod gains;
mod presets;

pub use eq::{FilterBank, CENTER_FREQUENCIES, FILTER_Q};
pub use error::{DspError, DspResult};
pub use gains::{db_to_amplitude, GainStore, GainVector, MAX_GAIN_DB, MIN_GAIN_DB, NUM_BANDS};
pub use presets::{Preset, PRESETS};
