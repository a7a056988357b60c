//! Headless playback controller for midistream.
//!
//! Owns the output device and the registered score, and runs the playback
//! worker. The CLI and tests drive playback through [`Controller`].

mod config;
mod error;
mod worker;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ms_device::{wake_channel, CompletionNotifier, DeviceError, OutputDevice, WakeReceiver, WakeSender};
use ms_engine::{build_score, VolumeShaper};
use parking_lot::Mutex;

use worker::{PlaybackStatus, Session, Worker};

pub use config::{PlayerConfig, VolumeRange};
pub use error::PlayerError;
pub use ms_formats::FormatError;

/// Where the controller is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// No score registered
    Idle,
    /// Score registered and first buffer queued
    Armed,
    /// Worker running
    Playing,
    /// Tearing down a playing session
    Stopping,
    /// Score registered, device halted
    Stopped,
}

/// Drives one output device through register / play / stop.
pub struct Controller<D: OutputDevice + 'static> {
    config: PlayerConfig,
    device: Arc<D>,
    wake_tx: WakeSender,
    wake_rx: WakeReceiver,
    volume: Arc<Mutex<VolumeShaper>>,
    status: Arc<PlaybackStatus>,
    state: PlayerState,
    /// Present while a score is registered and no worker holds it.
    session: Option<Session>,
    worker: Option<JoinHandle<Session>>,
    closed: bool,
}

impl<D: OutputDevice + 'static> Controller<D> {
    /// Open the device. `open_device` receives the notifier the device must
    /// use to report consumed buffers.
    pub fn open<F>(config: PlayerConfig, open_device: F) -> Result<Self, PlayerError>
    where
        F: FnOnce(CompletionNotifier) -> Result<D, DeviceError>,
    {
        let (wake_tx, wake_rx) = wake_channel();
        let device = open_device(wake_tx.notifier()).map_err(|e| {
            log::error!("failed to open output device: {}", e);
            PlayerError::device("open device")(e)
        })?;

        let mut volume = VolumeShaper::new();
        volume.reset_channels(config.default_channel_volume);

        Ok(Self {
            config,
            device: Arc::new(device),
            wake_tx,
            wake_rx,
            volume: Arc::new(Mutex::new(volume)),
            status: Arc::new(PlaybackStatus::default()),
            state: PlayerState::Idle,
            session: None,
            worker: None,
            closed: false,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// A non-looping score has played to its end.
    pub fn is_finished(&self) -> bool {
        self.status.finished.load(Ordering::Acquire)
    }

    /// The worker gave up after repeated submission failures.
    pub fn is_aborted(&self) -> bool {
        self.status.aborted.load(Ordering::Acquire)
    }

    pub fn gain(&self) -> f32 {
        self.volume.lock().gain()
    }

    // --- Score management ---

    /// Parse and arm a score. Any previously registered score is stopped and
    /// dropped first. On failure the controller is left `Idle`.
    pub fn register_score(&mut self, bytes: &[u8]) -> Result<(), PlayerError> {
        self.ensure_open()?;
        if self.state != PlayerState::Idle {
            self.unregister_score()?;
        }

        match self.arm(bytes) {
            Ok(session) => {
                log::info!("score registered: {} events", session.score.len());
                self.session = Some(session);
                self.status.clear();
                self.state = PlayerState::Armed;
                Ok(())
            }
            Err(e) => {
                log::error!("register failed: {}", e);
                // Whatever made it into the device queue is stale.
                if matches!(e, PlayerError::DeviceUnavailable { .. }) {
                    let _ = self.device.stop();
                }
                self.wake_rx.reset();
                Err(e)
            }
        }
    }

    fn arm(&mut self, bytes: &[u8]) -> Result<Session, PlayerError> {
        let file = ms_formats::load_midi(bytes)?;
        let mut session = Session::new(build_score(&file));
        log::debug!(
            "score: {} device events over {} ticks, division {:#06x}",
            session.score.len(),
            session.score.duration_ticks(),
            file.time_division()
        );

        self.volume.lock().reset_channels(self.config.default_channel_volume);
        self.device
            .set_time_division(file.time_division())
            .map_err(PlayerError::device("set time division"))?;
        self.device
            .set_tempo(self.config.initial_tempo)
            .map_err(PlayerError::device("set tempo"))?;

        self.wake_rx.reset();
        self.prime(&mut session)?;
        Ok(session)
    }

    /// Fill and queue the first buffer of a session.
    fn prime(&self, session: &mut Session) -> Result<(), PlayerError> {
        if session.refill(&self.volume) > 0 {
            self.device
                .submit(session.buffer.events())
                .map_err(PlayerError::device("submit first buffer"))?;
        }
        Ok(())
    }

    /// Stop if needed and release the score.
    pub fn unregister_score(&mut self) -> Result<(), PlayerError> {
        let stopped = self.stop();
        if self.session.take().is_some() {
            log::debug!("score unregistered");
        }
        self.state = PlayerState::Idle;
        stopped
    }

    // --- Transport ---

    /// Start playing the registered score from the top (or from where it
    /// was armed). Playing a session that already ran to its end restarts it.
    pub fn play(&mut self, looping: bool) -> Result<(), PlayerError> {
        self.ensure_open()?;
        if self.state == PlayerState::Playing && self.worker_done() {
            self.stop()?;
        }
        match self.state {
            PlayerState::Armed | PlayerState::Stopped => {}
            PlayerState::Idle => return Err(PlayerError::InvalidState("no score registered".into())),
            _ => return Err(PlayerError::InvalidState("already playing".into())),
        }
        let Some(mut session) = self.session.take() else {
            return Err(PlayerError::InvalidState("no score registered".into()));
        };

        session.score.set_looping(looping);
        if self.state == PlayerState::Stopped {
            // The device queue was flushed by stop.
            session.score.rewind();
            self.wake_rx.reset();
            if let Err(e) = self.prime(&mut session) {
                self.session = Some(session);
                return Err(e);
            }
        }

        if let Err(e) = self.device.start() {
            self.session = Some(session);
            return Err(PlayerError::device("start device")(e));
        }

        self.status.clear();
        let worker = Worker {
            device: self.device.clone(),
            wake: self.wake_rx.clone(),
            volume: self.volume.clone(),
            status: self.status.clone(),
            session,
            max_submit_failures: self.config.max_submit_failures,
            retry_delay: self.config.submit_retry_delay,
        };

        let handle = thread::Builder::new()
            .name("midistream-worker".into())
            .spawn(move || worker.run())
            .map_err(|e| {
                // The session went down with the closure.
                let _ = self.device.stop();
                self.state = PlayerState::Idle;
                PlayerError::Spawn(e.to_string())
            })?;

        self.worker = Some(handle);
        self.state = PlayerState::Playing;
        log::info!("playback started (looping: {})", looping);
        Ok(())
    }

    /// Halt playback and wait for the worker to exit. Safe in any state.
    pub fn stop(&mut self) -> Result<(), PlayerError> {
        let mut result = Ok(());
        match self.state {
            PlayerState::Idle | PlayerState::Stopped | PlayerState::Stopping => return Ok(()),
            PlayerState::Armed => {}
            PlayerState::Playing => {
                self.state = PlayerState::Stopping;
                self.wake_tx.request_stop();
                if let Some(handle) = self.worker.take() {
                    match handle.join() {
                        Ok(session) => self.session = Some(session),
                        Err(_) => {
                            log::error!("playback worker panicked; dropping score");
                            result = Err(PlayerError::WorkerPanicked);
                        }
                    }
                }
            }
        }

        if let Err(e) = self.device.stop() {
            log::warn!("device stop failed: {}", e);
        }
        if let Err(e) = self.device.reset() {
            log::warn!("device reset failed: {}", e);
        }
        self.wake_rx.reset();

        self.state = if self.session.is_some() {
            PlayerState::Stopped
        } else {
            PlayerState::Idle
        };
        log::debug!("playback stopped");
        result
    }

    /// Pause the device. Only valid while `Playing`; other states return
    /// `InvalidState` without touching the device.
    pub fn pause(&mut self) -> Result<(), PlayerError> {
        self.require_playing()?;
        self.device.pause().map_err(PlayerError::device("pause"))
    }

    /// Resume a paused device. Same state rule as [`pause`](Self::pause).
    pub fn resume(&mut self) -> Result<(), PlayerError> {
        self.require_playing()?;
        self.device.resume().map_err(PlayerError::device("resume"))
    }

    /// Set the output volume level (`0..=max_level`). Safe in any state.
    ///
    /// Every channel's volume is re-sent to the device at the new gain.
    pub fn set_volume(&mut self, level: u8) -> Result<(), PlayerError> {
        let range = self.config.volume;
        if level > range.max_level {
            return Err(PlayerError::InvalidState(format!(
                "volume level {} above maximum {}",
                level, range.max_level
            )));
        }

        let gain = range.gain_for_level(level);
        let messages = self.volume.lock().set_gain(gain);
        log::debug!("volume level {} -> gain {:.3}", level, gain);

        if self.closed {
            return Ok(());
        }
        for msg in messages {
            if let Err(e) = self.device.send_immediate(msg) {
                log::warn!("failed to send volume to channel {}: {}", msg.channel, e);
            }
        }
        Ok(())
    }

    /// Stop, drop the score and close the device.
    pub fn shutdown(&mut self) -> Result<(), PlayerError> {
        if self.closed {
            return Ok(());
        }
        let unregistered = self.unregister_score();
        self.closed = true;
        self.device.close().map_err(PlayerError::device("close device"))?;
        log::debug!("controller shut down");
        unregistered
    }

    // --- Helpers ---

    fn ensure_open(&self) -> Result<(), PlayerError> {
        if self.closed {
            return Err(PlayerError::InvalidState("controller shut down".into()));
        }
        Ok(())
    }

    fn require_playing(&self) -> Result<(), PlayerError> {
        if self.state != PlayerState::Playing {
            return Err(PlayerError::InvalidState(format!("not playing ({:?})", self.state)));
        }
        Ok(())
    }

    /// The worker has exited, or is about to, on its own.
    fn worker_done(&self) -> bool {
        self.is_finished()
            || self.is_aborted()
            || self.worker.as_ref().is_some_and(|handle| handle.is_finished())
    }
}

impl<D: OutputDevice + 'static> Drop for Controller<D> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("shutdown on drop: {}", e);
        }
    }
}
