//! Built-in EQ Presets

use crate::gains::NUM_BANDS;

/// Named EQ preset with 5 band gains (100 Hz, 300 Hz, 1 kHz, 3 kHz, 10 kHz)
pub type Preset = (&'static str, [f32; NUM_BANDS]);

/// List of built-in presets
pub const PRESETS: &[Preset] = &[
    ("Flat", [0.0; NUM_BANDS]),
    ("Bass Boost", [6.0, 4.0, 0.0, 0.0, 0.0]),
    ("Treble Boost", [0.0, 0.0, 0.0, 4.0, 6.0]),
    ("Vocal", [-2.0, 0.0, 4.0, 3.0, 0.0]),
    ("Loudness", [5.0, 0.0, -2.0, 0.0, 5.0]),
];
