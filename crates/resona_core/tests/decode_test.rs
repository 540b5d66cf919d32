//! Decoding files from disk

mod common;

use common::{Fixtures, SAMPLE_RATE};
use resona_core::{decode, DecodeError};

#[test]
fn test_decode_float_wav() {
    let fixtures = Fixtures::new();
    let tone = common::sine(440.0, SAMPLE_RATE as usize, 0.5);
    let path = fixtures.write_f32_wav("tone.wav", &tone);

    let buffer = decode(&path).unwrap();
    assert_eq!(buffer.sample_rate(), SAMPLE_RATE);
    assert_eq!(buffer.len(), tone.len());
    assert_eq!(buffer.codec(), Some("PCM_F32"));
    assert!((buffer.duration().as_secs_f32() - 1.0).abs() < 1e-3);

    for (decoded, original) in buffer.samples().iter().zip(&tone) {
        assert!((decoded - original).abs() < 1e-6);
    }
}

#[test]
fn test_decode_downmixes_stereo() {
    let fixtures = Fixtures::new();
    // Left +0.5, right -0.5: the mono mix cancels
    let interleaved: Vec<i16> = (0..2000).flat_map(|_| [16384i16, -16384]).collect();
    let path = fixtures.write_i16_wav("stereo.wav", 2, &interleaved);

    let buffer = decode(&path).unwrap();
    assert_eq!(buffer.len(), 2000);
    assert_eq!(buffer.source_channels(), 2);
    assert!(buffer.samples().iter().all(|s| s.abs() < 1e-4));
}

#[test]
fn test_decode_is_repeatable() {
    let fixtures = Fixtures::new();
    let path = fixtures.write_f32_wav("tone.wav", &common::sine(1000.0, 5000, 0.3));

    let first = decode(&path).unwrap();
    let second = decode(&path).unwrap();
    assert_eq!(first.samples(), second.samples());
}

#[test]
fn test_decode_errors() {
    let fixtures = Fixtures::new();

    assert!(matches!(
        decode(fixtures.path("missing.mp3")),
        Err(DecodeError::FileNotFound(_))
    ));

    let broken = fixtures.write_bytes("broken.wav", b"RIFF....WAVEjunk");
    assert!(matches!(decode(&broken), Err(DecodeError::CorruptData(_))));

    let text = fixtures.write_bytes("readme.txt", b"this is a plain text file, not audio at all");
    assert!(matches!(
        decode(&text),
        Err(DecodeError::UnsupportedFormat(_))
    ));
}

/// 20 frames of MPEG-1 Layer III, 128 kbit/s, 48 kHz mono, encoding silence
const SILENT_MP3: &str = "silence_48k_mono.mp3";
const MP3_FRAME_SAMPLES: usize = 1152;

#[test]
fn test_decode_mp3() {
    let buffer = decode(common::fixture(SILENT_MP3)).unwrap();

    assert_eq!(buffer.codec(), Some("MP3"));
    assert_eq!(buffer.sample_rate(), 48000);
    assert_eq!(buffer.source_channels(), 1);
    assert_eq!(buffer.len(), 20 * MP3_FRAME_SAMPLES);
    assert!((buffer.duration().as_secs_f32() - 0.48).abs() < 1e-3);
    assert!(buffer.samples().iter().all(|s| s.abs() < 1e-6));
}

#[test]
fn test_decode_damaged_mp3() {
    let fixtures = Fixtures::new();

    let text = fixtures.write_bytes("text.mp3", b"this file only pretends to be audio");
    assert!(matches!(decode(&text), Err(DecodeError::CorruptData(_))));

    // A frame header whose frame body is missing
    let truncated = fixtures.write_bytes("truncated.mp3", &[0xFF, 0xFB, 0x94, 0xC0, 0x00, 0x00]);
    assert!(matches!(decode(&truncated), Err(DecodeError::CorruptData(_))));
}
