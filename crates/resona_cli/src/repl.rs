//! Line-based commands read from stdin while playing

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use resona_core::Command;
use resona_dsp::GainVector;

pub const HELP: &str = "\
commands:
  play                 start from the beginning
  stop                 stop playback
  load <path>          decode another file (while stopped)
  gain <band> <db>     set one band, band 0-4 (100, 300, 1k, 3k, 10k Hz)
  gains <a b c d e>    set all five bands
  preset <name>        Flat, Bass Boost, Treble Boost, Vocal, Loudness
  status               show state, progress and gains
  help                 this text
  quit                 stop and exit";

/// A parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Engine(Command),
    Status,
    Help,
    Quit,
}

/// Parse one line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<Input>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let input = match verb.to_ascii_lowercase().as_str() {
        "play" | "p" => Input::Engine(Command::Play),
        "stop" | "s" => Input::Engine(Command::Stop),
        "load" => {
            if rest.is_empty() {
                bail!("usage: load <path>");
            }
            Input::Engine(Command::Load(PathBuf::from(rest.join(" "))))
        }
        "gain" | "g" => {
            let [band, gain_db] = rest.as_slice() else {
                bail!("usage: gain <band> <db>");
            };
            let band = band.parse().with_context(|| format!("band '{band}'"))?;
            let gain_db = gain_db.parse().with_context(|| format!("gain '{gain_db}'"))?;
            Input::Engine(Command::SetGain { band, gain_db })
        }
        "gains" => {
            let values = rest
                .iter()
                .map(|v| v.parse::<f32>().with_context(|| format!("gain '{v}'")))
                .collect::<Result<Vec<_>>>()?;
            let gains = GainVector::from_slice(&values).map_err(|e| anyhow!(e))?;
            Input::Engine(Command::SetGains(gains))
        }
        "preset" => {
            let name = rest.join(" ");
            let gains = GainVector::from_preset(&name).map_err(|e| anyhow!(e))?;
            Input::Engine(Command::SetGains(gains))
        }
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => bail!("unknown command '{other}' (try 'help')"),
    };
    Ok(Some(input))
}

/// Forward stdin lines to a channel from a background thread
///
/// The channel disconnects when stdin reaches end of file.
pub fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (sender, receiver) = unbounded();
    thread::Builder::new()
        .name("resona-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        })
        .context("spawn stdin reader")?;
    Ok(receiver)
}
