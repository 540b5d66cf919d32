//! Playback Controller - Main Entry Point
//!
//! The PlaybackController owns everything one playback needs: the decoded
//! buffer, the shared gain store, and while playing, the producer thread,
//! the block queue handle and the output stream. It lives on the control
//! thread; the only state it shares with other threads goes through
//! [`GainStore`], the block queue and [`StreamStats`].
//!
//! # State machine
//!
//! ```text
//!   load():  Idle -> Loading -> Idle
//!   play():  Idle -> Playing
//!   stop():  Playing -> Stopping -> Idle
//!   end of buffer: Playing -> Stopping (reported by state()) -> Idle on update()
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use resona_dsp::{FilterBank, GainStore, GainVector};

use crate::backend::{CpalBackend, OutputBackend, OutputSpec, OutputStream};
use crate::buffer::AudioBuffer;
use crate::config::EngineConfig;
use crate::decode::decode;
use crate::error::{EngineError, EngineResult};
use crate::message::{Command, Event, PlaybackState};
use crate::producer::BlockProducer;
use crate::queue::{block_queue, QueueHandle};
use crate::stream::{PlaybackStats, StreamCallback, StreamStats};

/// Resources of one Play() .. Stop() span
struct Session {
    producer: BlockProducer,
    stream: Box<dyn OutputStream>,
    queue: QueueHandle,
    stats: Arc<StreamStats>,
    started: Instant,
    duration: Duration,
}

impl Session {
    fn progress(&self) -> f32 {
        if self.stats.is_finished() || self.duration.is_zero() {
            return 1.0;
        }
        let fraction = self.started.elapsed().as_secs_f64() / self.duration.as_secs_f64();
        fraction.clamp(0.0, 1.0) as f32
    }
}

/// Orchestrates decoding, the producer thread and the output stream
pub struct PlaybackController {
    config: EngineConfig,
    backend: Box<dyn OutputBackend>,
    state: PlaybackState,

    buffer: Option<AudioBuffer>,
    source: Option<PathBuf>,
    gains: Arc<GainStore>,

    session: Option<Session>,

    /// Progress frozen when the last session ended
    progress: f32,
    last_stats: PlaybackStats,

    event_sender: Sender<Event>,
    event_receiver: Receiver<Event>,
}

impl PlaybackController {
    /// Controller playing through the configured cpal output device
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let backend = CpalBackend::new(config.output_device.clone());
        Self::with_backend(config, backend)
    }

    /// Controller playing through a custom backend
    pub fn with_backend(
        config: EngineConfig,
        backend: impl OutputBackend + 'static,
    ) -> EngineResult<Self> {
        config.validate()?;
        let (event_sender, event_receiver) = unbounded();

        info!(
            backend = backend.name(),
            block_frames = config.block_frames,
            queue_blocks = config.queue_blocks,
            "playback controller created"
        );

        Ok(Self {
            config,
            backend: Box::new(backend),
            state: PlaybackState::Idle,
            buffer: None,
            source: None,
            gains: Arc::new(GainStore::default()),
            session: None,
            progress: 0.0,
            last_stats: PlaybackStats::default(),
            event_sender,
            event_receiver,
        })
    }

    /// Decode `path` and make it the current buffer
    ///
    /// On failure the previously loaded buffer (if any) is kept.
    pub fn load(&mut self, path: impl AsRef<Path>) -> EngineResult<()> {
        let path = path.as_ref();
        self.update();
        self.require_idle("load")?;

        self.set_state(PlaybackState::Loading);
        let result = decode(path);
        self.set_state(PlaybackState::Idle);

        match result {
            Ok(buffer) => {
                self.source = Some(path.to_path_buf());
                self.install_buffer(buffer);
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "load failed");
                self.emit(Event::error(&e));
                Err(e.into())
            }
        }
    }

    /// Make an already decoded buffer the current one
    pub fn load_buffer(&mut self, buffer: AudioBuffer) -> EngineResult<()> {
        self.update();
        self.require_idle("load")?;
        self.source = None;
        self.install_buffer(buffer);
        Ok(())
    }

    /// Start playing the loaded buffer from the beginning
    pub fn play(&mut self) -> EngineResult<()> {
        self.update();
        self.require_idle("play")?;

        let buffer = self.buffer.as_ref().ok_or(EngineError::InvalidStateTransition {
            from: self.state,
            action: "play without a loaded file",
        })?;

        let sample_rate = buffer.sample_rate();
        let bank = FilterBank::new(sample_rate as f32)?;
        let (sender, receiver) = block_queue(self.config.block_frames, self.config.queue_blocks);
        let queue = sender.handle();
        let stats = Arc::new(StreamStats::new());
        let callback = StreamCallback::new(receiver, bank, Arc::clone(&self.gains), Arc::clone(&stats));

        // Start filling the queue before the device asks for the first block
        let producer = match BlockProducer::spawn(
            buffer.shared_samples(),
            sender,
            self.config.push_timeout(),
        ) {
            Ok(producer) => producer,
            Err(e) => {
                warn!(error = %e, "could not start producer");
                self.emit(Event::error(&e));
                return Err(e);
            }
        };

        let spec = OutputSpec {
            sample_rate,
            block_frames: self.config.block_frames,
        };
        let duration = buffer.duration();

        let stream = match self.backend.open(spec, callback, self.event_sender.clone()) {
            Ok(stream) => stream,
            Err(e) => {
                queue.cancel();
                producer.signal_stop();
                producer.join();

                let e = match e {
                    EngineError::NoDevicesFound => {
                        EngineError::DeviceOpenFailure("no output device available".into())
                    }
                    other => other,
                };
                warn!(error = %e, "could not open output");
                self.emit(Event::error(&e));
                return Err(e);
            }
        };

        self.session = Some(Session {
            producer,
            stream,
            queue,
            stats,
            started: Instant::now(),
            duration,
        });
        self.progress = 0.0;
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Stop playback; a no-op when nothing is playing
    pub fn stop(&mut self) -> EngineResult<()> {
        if self.session.is_none() {
            debug!(state = ?self.state, "stop ignored, not playing");
            return Ok(());
        }
        self.end_session(false);
        Ok(())
    }

    /// Set one band's gain in dB; takes effect from the next rendered block
    pub fn set_gain(&mut self, band: usize, gain_db: f32) -> EngineResult<()> {
        self.gains
            .set(band, gain_db)
            .map_err(EngineError::invalid_argument)?;
        debug!(band, gain_db, "gain set");
        Ok(())
    }

    /// Replace all five gains at once
    pub fn set_gains(&mut self, gains: GainVector) -> EngineResult<()> {
        self.gains.set_all(gains);
        debug!(gains = ?gains.as_array(), "gains set");
        Ok(())
    }

    pub fn gains(&self) -> GainVector {
        self.gains.snapshot()
    }

    /// Playback position as a fraction of the buffer duration, in [0, 1]
    ///
    /// Measured in wall time since play(); frozen when not playing. Reads 1.0
    /// once the end is reached, before [`Self::update`] has reaped the session.
    pub fn progress(&self) -> f32 {
        match &self.session {
            Some(session) if self.state == PlaybackState::Playing => session.progress(),
            _ => self.progress,
        }
    }

    /// Current state
    ///
    /// After the last block has played this reports `Stopping`, and the output
    /// stream and producer stay open, until [`Self::update`] (or any command)
    /// runs on the control thread. Control loops polling `state()` must call
    /// `update()` too.
    pub fn state(&self) -> PlaybackState {
        match &self.session {
            Some(session) if session.stats.is_finished() => PlaybackState::Stopping,
            _ => self.state,
        }
    }

    /// Finish a naturally completed session; call periodically from the
    /// control loop
    pub fn update(&mut self) {
        let finished = self
            .session
            .as_ref()
            .is_some_and(|session| session.stats.is_finished());
        if finished {
            self.end_session(true);
        }
    }

    /// Run a command
    pub fn dispatch(&mut self, command: Command) -> EngineResult<()> {
        match command {
            Command::Load(path) => self.load(path),
            Command::Play => self.play(),
            Command::Stop => self.stop(),
            Command::SetGain { band, gain_db } => self.set_gain(band, gain_db),
            Command::SetGains(gains) => self.set_gains(gains),
        }
    }

    /// Next pending event, if any (non-blocking)
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Receiver for handing events to another thread
    ///
    /// Receivers compete: each event goes to exactly one of them.
    pub fn event_receiver(&self) -> Receiver<Event> {
        self.event_receiver.clone()
    }

    /// Callback diagnostics of the running session, or of the last one
    pub fn stats(&self) -> PlaybackStats {
        match &self.session {
            Some(session) => session.stats.snapshot(),
            None => self.last_stats,
        }
    }

    pub fn buffer(&self) -> Option<&AudioBuffer> {
        self.buffer.as_ref()
    }

    /// Path of the loaded file, if it came from disk
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn install_buffer(&mut self, buffer: AudioBuffer) {
        self.emit(Event::Loaded {
            path: self
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            sample_rate: buffer.sample_rate(),
            frames: buffer.len(),
        });
        self.buffer = Some(buffer);
        self.progress = 0.0;
        self.last_stats = PlaybackStats::default();
    }

    /// Tear the session down: stop the producer, discard queued blocks,
    /// close the stream, then join
    fn end_session(&mut self, finished: bool) {
        let Some(session) = self.session.take() else {
            return;
        };

        self.progress = if finished { 1.0 } else { session.progress() };
        self.set_state(PlaybackState::Stopping);

        session.producer.signal_stop();
        session.queue.cancel();
        session.stream.close();
        let report = session.producer.join();

        let stats = session.stats.snapshot();
        self.last_stats = stats;

        info!(
            finished,
            progress = self.progress,
            blocks_pushed = report.blocks_pushed,
            blocks_rendered = stats.rendered_blocks,
            underruns = stats.underrun_events,
            "playback ended"
        );

        if stats.underrun_events > 0 {
            self.emit(Event::Underruns {
                events: stats.underrun_events,
                frames: stats.underrun_frames,
            });
        }
        if finished {
            self.emit(Event::Finished);
        }
        self.set_state(PlaybackState::Idle);
    }

    fn require_idle(&self, action: &'static str) -> EngineResult<()> {
        if self.state == PlaybackState::Idle && self.session.is_none() {
            Ok(())
        } else {
            Err(EngineError::InvalidStateTransition {
                from: self.state(),
                action,
            })
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "state change");
            self.state = state;
            self.emit(Event::StateChanged { state });
        }
    }

    fn emit(&self, event: Event) {
        // The controller holds a receiver, so this cannot fail
        let _ = self.event_sender.send(event);
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.end_session(false);
        }
    }
}
