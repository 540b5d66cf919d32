//! Resona - play an audio file through a 5-band peak-filter equalizer.
//!
//! ## Pipeline
//! 1. **Decode**: the whole file is decoded to mono `f32` with Symphonia.
//! 2. **Produce**: a background thread slices it into fixed-size blocks and queues them.
//! 3. **Playback**: the output callback equalizes each block with the current gains and
//!    writes it to the device.
//!
//! Gains can be seeded with `--gains` or `--preset` and changed while playing with
//! `--interactive` (commands on stdin).

mod cli;
mod repl;

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, TryRecvError};
use resona_core::{
    list_output_devices, Event, HeadlessBackend, PlaybackController, PlaybackState,
};
use tracing_subscriber::EnvFilter;

use crate::repl::Input;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const BAR_WIDTH: usize = 30;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("warn,resona_core=info,resona_dsp=info,resona_cli=info")
        }))
        .init();

    if args.list_devices {
        let devices = list_output_devices()?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&devices)?);
            return Ok(());
        }
        for device in devices {
            println!(
                "{}{}  ({}-{} Hz, up to {} ch)",
                device.name,
                if device.is_default { " [default]" } else { "" },
                device.min_sample_rate,
                device.max_sample_rate,
                device.max_channels
            );
        }
        return Ok(());
    }

    let config = args.engine_config()?;
    let mut controller = if args.headless {
        PlaybackController::with_backend(config, HeadlessBackend::new())?
    } else {
        PlaybackController::new(config)?
    };

    if let Some(gains) = args.initial_gains()? {
        controller.set_gains(gains)?;
    }

    let path = args.path.as_ref().context("no input file given")?;
    controller
        .load(path)
        .with_context(|| format!("load {}", path.display()))?;
    controller.play().context("start playback")?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("install Ctrl-C handler")?;

    let lines = if args.interactive {
        eprintln!("{}", repl::HELP);
        Some(repl::spawn_stdin_reader()?)
    } else {
        None
    };

    run(&mut controller, &args, lines.as_ref(), &interrupted)?;

    let stats = controller.stats();
    tracing::info!(
        rendered_blocks = stats.rendered_blocks,
        underruns = stats.underrun_events,
        "done"
    );
    Ok(())
}

/// Poll loop: events, stdin commands, progress line
///
/// Returns once playback is back to Idle and no more commands can arrive:
/// right away without `lines`, after end of input with them.
fn run(
    controller: &mut PlaybackController,
    args: &cli::Args,
    lines: Option<&Receiver<String>>,
    interrupted: &AtomicBool,
) -> Result<()> {
    let mut stdin_open = lines.is_some();
    loop {
        if interrupted.load(Ordering::SeqCst) {
            eprintln!();
            controller.stop()?;
            drain_events(controller, args.json);
            return Ok(());
        }

        controller.update();
        drain_events(controller, args.json);

        if let Some(lines) = lines.filter(|_| stdin_open) {
            match read_commands(controller, lines)? {
                Stdin::Open => {}
                // End of input: finish playing like the non-interactive mode
                Stdin::Closed => stdin_open = false,
                Stdin::Quit => {
                    drain_events(controller, args.json);
                    return Ok(());
                }
            }
        }

        if !stdin_open && controller.state() == PlaybackState::Idle {
            drain_events(controller, args.json);
            return Ok(());
        }

        if !args.json && controller.state() == PlaybackState::Playing {
            eprint!("\r{}", progress_line(controller.progress()));
            let _ = io::stderr().flush();
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Where the stdin reader stands after a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stdin {
    Open,
    Closed,
    Quit,
}

/// Run every line queued since the last poll
fn read_commands(controller: &mut PlaybackController, lines: &Receiver<String>) -> Result<Stdin> {
    loop {
        match lines.try_recv() {
            Ok(line) => {
                if !handle_line(controller, &line)? {
                    return Ok(Stdin::Quit);
                }
            }
            Err(TryRecvError::Empty) => return Ok(Stdin::Open),
            Err(TryRecvError::Disconnected) => return Ok(Stdin::Closed),
        }
    }
}

/// Run one stdin line; returns false on quit
fn handle_line(controller: &mut PlaybackController, line: &str) -> Result<bool> {
    match repl::parse_line(line) {
        Ok(None) => {}
        Ok(Some(Input::Quit)) => {
            controller.stop()?;
            return Ok(false);
        }
        Ok(Some(Input::Help)) => eprintln!("{}", repl::HELP),
        Ok(Some(Input::Status)) => eprintln!(
            "{:?}  {}  gains {:?}",
            controller.state(),
            progress_line(controller.progress()),
            controller.gains().as_array()
        ),
        Ok(Some(Input::Engine(command))) => {
            if let Err(e) = controller.dispatch(command) {
                eprintln!("error: {e}");
            }
        }
        Err(e) => eprintln!("error: {e:#}"),
    }
    Ok(true)
}

fn drain_events(controller: &PlaybackController, json: bool) {
    while let Some(event) = controller.poll_event() {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!("event serialization failed: {e}"),
            }
            continue;
        }
        match event {
            Event::Finished => eprintln!("\rfinished{:width$}", "", width = BAR_WIDTH + 10),
            Event::Error { message } => eprintln!("\rerror: {message}"),
            Event::Underruns { events, frames } => {
                eprintln!("\r{events} underruns ({frames} frames of silence)")
            }
            Event::Loaded {
                path,
                sample_rate,
                frames,
            } => eprintln!(
                "loaded {path}: {:.1}s at {sample_rate} Hz",
                frames as f64 / sample_rate.max(1) as f64
            ),
            Event::StateChanged { .. } => {}
        }
    }
}

/// "[#######.......]  42.0%"
fn progress_line(fraction: f32) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    let filled = (fraction * BAR_WIDTH as f32).round() as usize;
    format!(
        "[{}{}] {:5.1}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        fraction * 100.0
    )
}
