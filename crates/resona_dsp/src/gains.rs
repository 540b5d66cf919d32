//! Band gains shared between the control thread and the audio callback
//!
//! [`GainVector`] is the plain value type: five validated dB offsets.
//! [`GainStore`] is the shared cell. The control thread writes single bands
//! or whole vectors, the audio callback takes one [`GainStore::snapshot`] per
//! invocation and uses that copy for the whole block.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{DspError, DspResult};
use crate::presets::PRESETS;

/// Number of equalizer bands
pub const NUM_BANDS: usize = 5;

/// Lowest accepted band gain in dB
pub const MIN_GAIN_DB: f32 = -50.0;

/// Highest accepted band gain in dB
pub const MAX_GAIN_DB: f32 = 50.0;

/// Convert dB gain to linear amplitude
/// Formula: amplitude = 10^(dB/20)
#[inline]
pub fn db_to_amplitude(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

fn check_band(band: usize) -> DspResult<()> {
    if band >= NUM_BANDS {
        return Err(DspError::InvalidBandIndex(band));
    }
    Ok(())
}

fn check_gain(gain_db: f32) -> DspResult<()> {
    // NaN fails both comparisons, so it is rejected here as well
    if !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&gain_db) {
        return Err(DspError::InvalidGain(gain_db));
    }
    Ok(())
}

/// Five band gains in dB, one per center frequency
///
/// Every value is guaranteed to be within [`MIN_GAIN_DB`]..=[`MAX_GAIN_DB`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GainVector([f32; NUM_BANDS]);

impl GainVector {
    /// All bands at 0 dB
    pub const FLAT: GainVector = GainVector([0.0; NUM_BANDS]);

    /// Build a gain vector, rejecting out-of-range values
    pub fn new(gains: [f32; NUM_BANDS]) -> DspResult<Self> {
        for gain in gains {
            check_gain(gain)?;
        }
        Ok(Self(gains))
    }

    /// Build a gain vector from a slice of exactly five values
    pub fn from_slice(gains: &[f32]) -> DspResult<Self> {
        let gains: [f32; NUM_BANDS] =
            gains
                .try_into()
                .map_err(|_| DspError::BlockSizeMismatch {
                    expected: NUM_BANDS,
                    got: gains.len(),
                })?;
        Self::new(gains)
    }

    /// Look up a built-in preset by name (case-insensitive)
    pub fn from_preset(name: &str) -> DspResult<Self> {
        PRESETS
            .iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name.trim()))
            .map(|(_, gains)| Self(*gains))
            .ok_or_else(|| DspError::UnknownPreset(name.to_string()))
    }

    /// Gain of a single band
    pub fn get(&self, band: usize) -> Option<f32> {
        self.0.get(band).copied()
    }

    /// Set the gain of a single band
    ///
    /// On error the vector is left unchanged.
    pub fn set(&mut self, band: usize, gain_db: f32) -> DspResult<()> {
        check_band(band)?;
        check_gain(gain_db)?;
        self.0[band] = gain_db;
        Ok(())
    }

    /// Raw dB values
    pub fn as_array(&self) -> [f32; NUM_BANDS] {
        self.0
    }

    /// Linear multipliers for every band
    pub fn linear(&self) -> [f32; NUM_BANDS] {
        core::array::from_fn(|i| db_to_amplitude(self.0[i]))
    }
}

/// Lock-free gain storage shared with the audio callback
///
/// Rust pattern: AtomicF32 doesn't exist, so each band is stored as the
/// bit pattern of its f32 inside an AtomicU32.
pub struct GainStore {
    bands: [AtomicU32; NUM_BANDS],
}

impl GainStore {
    pub fn new(initial: GainVector) -> Self {
        Self {
            bands: core::array::from_fn(|i| AtomicU32::new(initial.0[i].to_bits())),
        }
    }

    /// Set a single band
    ///
    /// Validation happens before the store, so a rejected call leaves
    /// every band untouched.
    pub fn set(&self, band: usize, gain_db: f32) -> DspResult<()> {
        check_band(band)?;
        check_gain(gain_db)?;
        self.bands[band].store(gain_db.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Replace all five bands
    pub fn set_all(&self, gains: GainVector) {
        for (slot, gain) in self.bands.iter().zip(gains.0) {
            slot.store(gain.to_bits(), Ordering::Relaxed);
        }
    }

    /// Current value of one band
    pub fn get(&self, band: usize) -> Option<f32> {
        self.bands
            .get(band)
            .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)))
    }

    /// Copy of all five bands
    ///
    /// # Real-time Safety
    /// Five relaxed loads, no locks, no allocation.
    #[inline]
    pub fn snapshot(&self) -> GainVector {
        GainVector(core::array::from_fn(|i| {
            f32::from_bits(self.bands[i].load(Ordering::Relaxed))
        }))
    }
}

impl Default for GainStore {
    fn default() -> Self {
        Self::new(GainVector::FLAT)
    }
}
