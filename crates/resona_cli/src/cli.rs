use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use resona_core::EngineConfig;
use resona_dsp::GainVector;

#[derive(Parser, Debug)]
#[command(name = "resona", version, about = "Play an audio file through a 5-band equalizer")]
pub struct Args {
    /// Audio file to play (wav, mp3, flac, ogg)
    #[arg(required_unless_present = "list_devices")]
    pub path: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Initial gains in dB for 100,300,1000,3000,10000 Hz, e.g. "0,0,6,0,-3"
    #[arg(long, value_parser = parse_gains, allow_hyphen_values = true, conflicts_with = "preset")]
    pub gains: Option<GainVector>,

    /// Initial gains from a built-in preset (Flat, Bass Boost, Treble Boost, Vocal, Loudness)
    #[arg(long)]
    pub preset: Option<String>,

    /// Block size in frames (overrides the config file)
    #[arg(long)]
    pub block_frames: Option<usize>,

    /// Queue capacity in blocks (overrides the config file)
    #[arg(long)]
    pub queue_blocks: Option<usize>,

    /// JSON engine config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Render without an audio device (timing only)
    #[arg(long)]
    pub headless: bool,

    /// Read commands (play, stop, gain, preset, quit) from stdin
    #[arg(long, short)]
    pub interactive: bool,

    /// Print events as JSON lines instead of text
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Defaults, then the config file, then command-line flags
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)
                .with_context(|| format!("load config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(frames) = self.block_frames {
            config.block_frames = frames;
        }
        if let Some(blocks) = self.queue_blocks {
            config.queue_blocks = blocks;
        }
        if self.device.is_some() {
            config.output_device = self.device.clone();
        }

        config.validate().context("invalid engine config")?;
        Ok(config)
    }

    /// Gains to seed before playing, if any were given
    pub fn initial_gains(&self) -> Result<Option<GainVector>> {
        if let Some(gains) = self.gains {
            return Ok(Some(gains));
        }
        self.preset
            .as_deref()
            .map(|name| GainVector::from_preset(name).with_context(|| format!("preset '{name}'")))
            .transpose()
    }
}

/// Parse "a,b,c,d,e" into a validated gain vector
pub fn parse_gains(s: &str) -> Result<GainVector, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f32>().map_err(|e| format!("'{v}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    GainVector::from_slice(&values).map_err(|e| e.to_string())
}
