//! 5-Band Resonant Peak Filter Bank
//!
//! Each band is a second-order resonant peak (band-pass with unity gain at
//! the center frequency). A block is run through all five filters in
//! parallel, each filtered copy is scaled by its band's linear gain, and the
//! output is the sum of those five scaled copies.
//!
//! There is no unfiltered pass-through term in the sum, so a flat (0 dB)
//! setting does not reproduce the input. Every call also starts every filter
//! from a cleared delay line: nothing carries over from the previous block.

use biquad::{Biquad, Coefficients, DirectForm2Transposed};
use tracing::warn;

use crate::error::{DspError, DspResult};
use crate::gains::{GainVector, NUM_BANDS};

/// Band center frequencies (Hz)
pub const CENTER_FREQUENCIES: [f32; NUM_BANDS] = [100.0, 300.0, 1000.0, 3000.0, 10000.0];

/// Quality factor shared by all bands
pub const FILTER_Q: f32 = 1.0;

/// Design a resonant peak filter
///
/// Bilinear-transform band-pass with -3 dB bandwidth `w0 / q`:
///
/// ```text
/// w0   = 2*pi*f0/fs
/// beta = tan(w0 / (2q))
/// g    = 1 / (1 + beta)
/// b    = [1 - g, 0, -(1 - g)]
/// a    = [1, -2*g*cos(w0), 2*g - 1]
/// ```
///
/// This is the `iirpeak` design: the -3 dB bandwidth is exactly `w0 / q` at
/// every center frequency. biquad's `Type::BandPass` uses
/// `alpha = sin(w0) / (2q)` instead, which narrows the top band to about
/// two thirds of that at 44.1 kHz, so the coefficients are built here.
///
/// Returns `None` when the center frequency is not below Nyquist.
fn peak_coefficients(frequency: f32, q: f32, sample_rate: f32) -> Option<Coefficients<f32>> {
    // Design in f64, run in f32
    let w0 = 2.0 * std::f64::consts::PI * f64::from(frequency) / f64::from(sample_rate);
    if !(w0 > 0.0 && w0 < std::f64::consts::PI) {
        return None;
    }
    let beta = (w0 / (2.0 * f64::from(q))).tan();
    let g = 1.0 / (1.0 + beta);

    Some(Coefficients {
        a1: (-2.0 * g * w0.cos()) as f32,
        a2: (2.0 * g - 1.0) as f32,
        b0: (1.0 - g) as f32,
        b1: 0.0,
        b2: (-(1.0 - g)) as f32,
    })
}

/// The filter bank applied to every block
///
/// Coefficients depend only on the sample rate and Q, so they are computed
/// once here. Only the gains change between calls.
#[derive(Debug, Clone)]
pub struct FilterBank {
    sample_rate: f32,
    // `None` for a band whose center frequency is at or above Nyquist
    coefficients: [Option<Coefficients<f32>>; NUM_BANDS],
}

impl FilterBank {
    /// Design the five bands for `sample_rate`
    pub fn new(sample_rate: f32) -> DspResult<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }

        let coefficients = core::array::from_fn(|i| {
            let coeffs = peak_coefficients(CENTER_FREQUENCIES[i], FILTER_Q, sample_rate);
            if coeffs.is_none() {
                warn!(
                    band = i,
                    frequency = CENTER_FREQUENCIES[i],
                    sample_rate,
                    "band is above Nyquist and will stay silent"
                );
            }
            coeffs
        });

        Ok(Self {
            sample_rate,
            coefficients,
        })
    }

    /// Sample rate the coefficients were designed for
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Whether band `band` can be realised at this sample rate
    pub fn is_band_active(&self, band: usize) -> bool {
        self.coefficients.get(band).is_some_and(Option::is_some)
    }

    /// Equalize `block` into `out`
    ///
    /// `out[n] = sum over bands of gain_linear[b] * peak_b(block)[n]`
    ///
    /// # Real-time Safety
    /// No allocations, no locks. O(5 * n) where n = block length.
    #[inline]
    pub fn apply_into(&self, block: &[f32], gains: &GainVector, out: &mut [f32]) -> DspResult<()> {
        if out.len() != block.len() {
            return Err(DspError::BlockSizeMismatch {
                expected: block.len(),
                got: out.len(),
            });
        }

        out.fill(0.0);
        let linear = gains.linear();

        for (coeffs, gain) in self.coefficients.iter().zip(linear) {
            let Some(coeffs) = coeffs else { continue };
            // Fresh delay line per call
            let mut filter = DirectForm2Transposed::<f32>::new(*coeffs);
            for (o, &x) in out.iter_mut().zip(block) {
                *o += gain * filter.run(x);
            }
        }

        Ok(())
    }

    /// Equalize `block` into a newly allocated block
    ///
    /// Convenience for offline use. The audio callback uses [`Self::apply_into`].
    pub fn apply(&self, block: &[f32], gains: &GainVector) -> Vec<f32> {
        let mut out = vec![0.0; block.len()];
        // Lengths match by construction
        let _ = self.apply_into(block, gains, &mut out);
        out
    }

    /// Unscaled output of a single band (its 0 dB contribution)
    pub fn band_response(&self, band: usize, block: &[f32]) -> DspResult<Vec<f32>> {
        let coeffs = self
            .coefficients
            .get(band)
            .ok_or(DspError::InvalidBandIndex(band))?;

        let Some(coeffs) = coeffs else {
            return Ok(vec![0.0; block.len()]);
        };
        let mut filter = DirectForm2Transposed::<f32>::new(*coeffs);
        Ok(block.iter().map(|&x| filter.run(x)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate;
                (2.0 * std::f32::consts::PI * freq * t).sin() * amplitude
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_invalid_sample_rate() {
        assert!(FilterBank::new(0.0).is_err());
        assert!(FilterBank::new(-44100.0).is_err());
        assert!(FilterBank::new(f32::NAN).is_err());
    }

    #[test]
    fn test_coefficients_are_band_pass() {
        let coeffs = peak_coefficients(1000.0, 1.0, 44100.0).unwrap();
        assert_eq!(coeffs.b1, 0.0);
        assert!((coeffs.b0 + coeffs.b2).abs() < 1e-7);
        // Stable pole pair: |a2| < 1
        assert!(coeffs.a2.abs() < 1.0);
    }

    /// |H(e^jw)|^2 of a biquad
    fn power_response(c: &Coefficients<f32>, w: f64) -> f64 {
        let (b0, b1, b2) = (f64::from(c.b0), f64::from(c.b1), f64::from(c.b2));
        let (a1, a2) = (f64::from(c.a1), f64::from(c.a2));
        let (c1, s1, c2, s2) = (w.cos(), w.sin(), (2.0 * w).cos(), (2.0 * w).sin());
        let num = (b0 + b1 * c1 + b2 * c2).powi(2) + (b1 * s1 + b2 * s2).powi(2);
        let den = (1.0 + a1 * c1 + a2 * c2).powi(2) + (a1 * s1 + a2 * s2).powi(2);
        num / den
    }

    /// Frequency in (lo, hi) where the response crosses half power
    fn half_power_edge(c: &Coefficients<f32>, mut lo: f64, mut hi: f64) -> f64 {
        let rising = power_response(c, lo) < power_response(c, hi);
        for _ in 0..60 {
            let mid = 0.5 * (lo + hi);
            if (power_response(c, mid) < 0.5) == rising {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }

    #[test]
    fn test_unity_center_and_bandwidth_w0_over_q() {
        let sample_rate = 44100.0;
        for &frequency in &CENTER_FREQUENCIES {
            let c = peak_coefficients(frequency, FILTER_Q, sample_rate).unwrap();
            let w0 = 2.0 * std::f64::consts::PI * f64::from(frequency) / f64::from(sample_rate);

            assert!((power_response(&c, w0) - 1.0).abs() < 1e-4, "{frequency} Hz");

            let lower = half_power_edge(&c, 1e-9, w0);
            let upper = half_power_edge(&c, w0, std::f64::consts::PI - 1e-9);
            let bandwidth = (upper - lower) / w0;
            assert!(
                (bandwidth - 1.0 / f64::from(FILTER_Q)).abs() < 1e-3,
                "{frequency} Hz: bandwidth {bandwidth} x w0"
            );
        }
    }

    #[test]
    fn test_band_above_nyquist_is_silent() {
        let bank = FilterBank::new(16000.0).unwrap();
        assert!(bank.is_band_active(3));
        assert!(!bank.is_band_active(4));

        let block = sine(1000.0, 16000.0, 256, 0.5);
        let silent = bank.band_response(4, &block).unwrap();
        assert!(silent.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_apply_is_deterministic() {
        let bank = FilterBank::new(44100.0).unwrap();
        let block = sine(440.0, 44100.0, 1024, 0.5);
        let gains = GainVector::new([3.0, -6.0, 12.0, 0.0, -50.0]).unwrap();

        let first = bank.apply(&block, &gains);
        let second = bank.apply(&block, &gains);
        assert_eq!(first, second);

        // A different block in between leaves no trace
        let _ = bank.apply(&sine(9000.0, 44100.0, 1024, 1.0), &gains);
        assert_eq!(bank.apply(&block, &gains), first);
    }

    #[test]
    fn test_flat_output_is_sum_of_bands_not_input() {
        let bank = FilterBank::new(44100.0).unwrap();
        let block = sine(1000.0, 44100.0, 1024, 0.5);

        let out = bank.apply(&block, &GainVector::FLAT);

        let mut summed = vec![0.0_f32; block.len()];
        for band in 0..NUM_BANDS {
            let component = bank.band_response(band, &block).unwrap();
            for (s, c) in summed.iter_mut().zip(component) {
                *s += c;
            }
        }

        for (o, s) in out.iter().zip(&summed) {
            assert!((o - s).abs() < 1e-5);
        }

        let max_diff = out
            .iter()
            .zip(&block)
            .map(|(o, i)| (o - i).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_diff > 0.05, "flat output should differ from input");
    }

    #[test]
    fn test_dc_is_rejected() {
        let bank = FilterBank::new(44100.0).unwrap();
        let block = vec![0.5_f32; 1024];

        let out = bank.apply(&block, &GainVector::FLAT);
        assert!(out[out.len() - 1].abs() < 0.05);
    }

    #[test]
    fn test_plus_20_db_scales_band_contribution_by_ten() {
        let bank = FilterBank::new(44100.0).unwrap();
        let block = sine(1000.0, 44100.0, 1024, 0.5);

        let flat = bank.apply(&block, &GainVector::FLAT);
        let boosted = bank.apply(&block, &GainVector::new([0.0, 0.0, 20.0, 0.0, 0.0]).unwrap());
        let component = bank.band_response(2, &block).unwrap();

        // boosted - flat = (10 - 1) * component
        for ((b, f), c) in boosted.iter().zip(&flat).zip(&component) {
            assert!((b - f - 9.0 * c).abs() < 1e-3);
        }
    }

    #[test]
    fn test_boost_increases_amplitude() {
        let bank = FilterBank::new(44100.0).unwrap();
        let block = sine(1000.0, 44100.0, 1024, 0.5);

        let flat = rms(&bank.apply(&block, &GainVector::FLAT));
        let boosted = rms(&bank.apply(&block, &GainVector::new([0.0, 0.0, 20.0, 0.0, 0.0]).unwrap()));
        assert!(boosted > flat * 5.0);
    }

    #[test]
    fn test_output_is_not_clamped() {
        let bank = FilterBank::new(44100.0).unwrap();
        let block = sine(1000.0, 44100.0, 1024, 0.9);

        let out = bank.apply(&block, &GainVector::new([0.0, 0.0, 50.0, 0.0, 0.0]).unwrap());
        assert!(out.iter().any(|s| s.abs() > 1.0));
        assert!(out.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_apply_into_length_mismatch() {
        let bank = FilterBank::new(48000.0).unwrap();
        let block = vec![0.0; 64];
        let mut out = vec![0.0; 32];
        assert_eq!(
            bank.apply_into(&block, &GainVector::FLAT, &mut out),
            Err(DspError::BlockSizeMismatch {
                expected: 64,
                got: 32
            })
        );
    }

    #[test]
    fn test_band_response_invalid_index() {
        let bank = FilterBank::new(48000.0).unwrap();
        assert_eq!(
            bank.band_response(5, &[0.0; 4]),
            Err(DspError::InvalidBandIndex(5))
        );
    }

    #[test]
    fn test_sample_rate_stored() {
        let bank = FilterBank::new(44100.0).unwrap();
        assert_eq!(bank.sample_rate(), 44100.0);
    }
}
