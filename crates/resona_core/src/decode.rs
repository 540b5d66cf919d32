//! File decoding
//!
//! Uses Symphonia to probe the container, decode every packet to interleaved
//! `f32`, and downmix to mono by averaging channels. The whole file is decoded
//! up front; playback never touches the filesystem.

use std::fs::File;
use std::io;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

use crate::buffer::AudioBuffer;
use crate::error::DecodeError;

/// Extensions the enabled Symphonia features can read
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "wave", "mp3", "flac", "ogg", "oga"];

/// Decode `path` into a mono [`AudioBuffer`]
pub fn decode(path: impl AsRef<Path>) -> Result<AudioBuffer, DecodeError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(DecodeError::FileNotFound(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DecodeError::FileNotFound(path.to_path_buf()),
        _ => DecodeError::CorruptData(format!("open {}: {e}", path.display())),
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let mut hint = Hint::new();
    if let Some(ext) = extension.as_deref() {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| {
            // A known extension that fails to probe is a damaged file
            let known = extension
                .as_deref()
                .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext));
            if known {
                DecodeError::CorruptData(e.to_string())
            } else {
                DecodeError::UnsupportedFormat(format!("{}: {e}", path.display()))
            }
        })?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| DecodeError::CorruptData("no audio track".into()))?;
    let track_id = track.id;
    let codec_params: CodecParameters = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| match e {
            SymphoniaError::Unsupported(what) => DecodeError::UnsupportedFormat(what.to_string()),
            other => DecodeError::CorruptData(other.to_string()),
        })?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut mono: Vec<f32> = Vec::with_capacity(codec_params.n_frames.unwrap_or(0) as usize);
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                if mono.is_empty() {
                    return Err(DecodeError::CorruptData(e.to_string()));
                }
                warn!(error = %e, "stopping decode early on read error");
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                skipped_packets += 1;
                debug!(error = e, "skipping undecodable packet");
                continue;
            }
            Err(SymphoniaError::IoError(_)) => {
                skipped_packets += 1;
                continue;
            }
            Err(e) => return Err(DecodeError::CorruptData(e.to_string())),
        };

        let spec = *decoded.spec();
        if decoded.frames() == 0 {
            continue;
        }
        sample_rate = sample_rate.or(Some(spec.rate));
        channels = spec.channels.count();

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        downmix_into(sample_buf.samples(), channels, &mut mono);
    }

    let sample_rate = sample_rate
        .filter(|&rate| rate > 0)
        .ok_or_else(|| DecodeError::CorruptData("unknown sample rate".into()))?;

    if mono.is_empty() {
        return Err(DecodeError::CorruptData("no decodable audio".into()));
    }

    if skipped_packets > 0 {
        warn!(skipped_packets, "some packets could not be decoded");
    }

    let codec = codec_name_from_params(&codec_params);
    info!(
        path = %path.display(),
        sample_rate,
        channels,
        frames = mono.len(),
        codec = codec.as_deref().unwrap_or("unknown"),
        "decoded"
    );

    Ok(AudioBuffer::new(mono, sample_rate).with_source(channels, codec))
}

/// Average interleaved frames of `channels` samples into `out`
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Best-effort codec label for display
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        CODEC_TYPE_PCM_U8 => "PCM_U8",
        _ => return None,
    };
    Some(name.to_string())
}
