use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::audio::notifier::{Notifier, NotifierLoop, PlaybackEvent};
use crate::audio::output::{AudioOutput, CpalOutput, OutputStream, RenderContext};
use crate::audio::state::PlaybackState;
use crate::error::{PlaybackError, PlaybackResult};
use crate::events::EventBus;
use crate::store::SampleStore;
use crate::types::{frames_to_seconds, seconds_to_frames, PlaybackStatus, RENDER_EVENT_CAPACITY};

/// Transport over a [`SampleStore`]
///
/// Driven from a control thread while the output device pulls audio from a
/// real-time callback. Commands only touch atomics in [`PlaybackState`]; the
/// callback picks them up on its next buffer.
pub struct PlaybackEngine {
    /// Backend that opens output streams
    output: Box<dyn AudioOutput>,

    /// State shared with the render callback
    state: Arc<PlaybackState>,

    /// Currently loaded audio
    store: Option<Arc<SampleStore>>,

    /// Open output stream (None when no audio is loaded or the device failed)
    stream: Option<Box<dyn OutputStream>>,

    /// Position/finish notifier for the open stream
    notifier: Option<Notifier>,

    /// Observers
    bus: EventBus<PlaybackEvent>,
}

impl PlaybackEngine {
    /// Create an engine on top of an output backend
    pub fn new(output: impl AudioOutput + 'static) -> Self {
        Self {
            output: Box::new(output),
            state: Arc::new(PlaybackState::new()),
            store: None,
            stream: None,
            notifier: None,
            bus: EventBus::new(),
        }
    }

    /// Create an engine on the default cpal output device
    pub fn with_default_output(buffer_frames: Option<u32>) -> Self {
        Self::new(CpalOutput::new(buffer_frames))
    }

    /// Register an observer for state, position and error notifications
    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        self.bus.subscribe()
    }

    /// Replace the loaded audio and open a stream sized to it
    ///
    /// Stops playback, rewinds to 0 and clears the region. A device failure
    /// is returned and published; transport commands are no-ops until the
    /// next successful load.
    pub fn load(&mut self, store: Arc<SampleStore>) -> PlaybackResult<()> {
        self.close_stream();
        self.state.reset();

        let sample_rate = store.sample_rate();
        let frames = store.frame_count() as u64;
        self.store = Some(store.clone());

        self.bus.emit(PlaybackEvent::StateChanged(PlaybackStatus::Stopped));
        self.bus.emit(PlaybackEvent::position(0, sample_rate));
        self.bus.emit(PlaybackEvent::duration(frames, sample_rate));

        let (producer, consumer) = rtrb::RingBuffer::new(RENDER_EVENT_CAPACITY);
        let stream_failed = Arc::new(AtomicBool::new(false));

        let ctx = RenderContext {
            store: store.clone(),
            state: self.state.clone(),
            events: producer,
            stream_failed: stream_failed.clone(),
        };

        match self.output.open(ctx) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.notifier = Some(Notifier::spawn(NotifierLoop::new(
                    consumer,
                    self.state.clone(),
                    stream_failed,
                    sample_rate,
                    self.bus.clone(),
                )));
                log::info!(
                    "Loaded audio: {} frames, {} Hz, {} channel(s)",
                    frames,
                    sample_rate,
                    store.channel_count()
                );
                Ok(())
            }
            Err(e) => {
                log::error!("Playback disabled: {}", e);
                Err(self.report(e))
            }
        }
    }

    /// Start or resume playback
    ///
    /// Resumes in place when paused. From Stopped, an active region that does
    /// not contain the position moves the position to the region start.
    pub fn play(&mut self) -> PlaybackResult<()> {
        let frame_count = match &self.store {
            Some(store) if !store.is_empty() => store.frame_count() as u64,
            _ => return Err(self.report(PlaybackError::NoAudioLoaded)),
        };

        let Some(stream) = self.stream.as_mut() else {
            log::debug!("play() ignored: no output stream");
            return Ok(());
        };

        if self.state.is_playing() && !self.state.is_paused() {
            log::debug!("play() ignored: already playing");
            return Ok(());
        }

        if self.state.is_paused() {
            log::debug!("Resuming at frame {}", self.state.get_position());
        } else {
            let pos = self.state.get_position();
            match self.state.region() {
                Some((start, end)) if pos < start || pos >= end => {
                    log::debug!("Positioned at region start: {}", start);
                    self.state.set_position(start);
                }
                None if pos >= frame_count => {
                    self.state.set_position(0);
                }
                _ => {}
            }
        }

        let started = if stream.is_active() { Ok(()) } else { stream.start() };
        if let Err(e) = started {
            return Err(self.report(e));
        }

        self.state.set_paused(false);
        self.state.set_playing(true);
        self.bus.emit(PlaybackEvent::StateChanged(PlaybackStatus::Playing));

        Ok(())
    }

    /// Pause; the callback renders silence and keeps the position
    pub fn pause(&mut self) {
        if self.stream.is_none() || !self.state.is_playing() {
            return;
        }

        self.state.set_paused(true);
        self.state.set_playing(false);
        self.bus.emit(PlaybackEvent::StateChanged(PlaybackStatus::Paused));
        log::debug!("Paused at frame {}", self.state.get_position());
    }

    /// Stop and rewind to 0
    pub fn stop(&mut self) -> PlaybackResult<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };

        self.state.set_playing(false);
        self.state.set_paused(false);

        let stopped = if stream.is_active() { stream.stop() } else { Ok(()) };

        self.state.set_position(0);
        self.bus.emit(PlaybackEvent::StateChanged(PlaybackStatus::Stopped));
        self.bus.emit(PlaybackEvent::position(0, self.sample_rate()));
        log::debug!("Stopped");

        stopped.map_err(|e| self.report(e))
    }

    /// Move to `frames`, clamped to `[0, frame_count]`
    ///
    /// Does not start or stop playback.
    pub fn seek(&mut self, frames: u64) -> PlaybackResult<()> {
        let frame_count = match &self.store {
            Some(store) => store.frame_count() as u64,
            None => return Err(self.report(PlaybackError::NoAudioLoaded)),
        };

        if self.stream.is_none() {
            return Ok(());
        }

        let target = frames.min(frame_count);
        self.state.set_position(target);
        self.bus.emit(PlaybackEvent::position(target, self.sample_rate()));
        Ok(())
    }

    /// Seek to a time in seconds
    pub fn seek_seconds(&mut self, seconds: f64) -> PlaybackResult<()> {
        self.seek(seconds_to_frames(seconds, self.sample_rate()))
    }

    /// Set output volume (clamped to 0.0 - 1.0)
    pub fn set_volume(&self, volume: f32) {
        self.state.set_volume(volume);
        log::debug!("Volume: {:.2}", self.state.get_volume());
    }

    pub fn set_loop(&self, enabled: bool) {
        self.state.set_looping(enabled);
        log::debug!("Loop: {}", enabled);
    }

    /// Restrict playback to `[start, end)`
    ///
    /// An empty or inverted range is rejected and the previous region kept.
    pub fn set_region(&self, start: u64, end: u64) -> PlaybackResult<()> {
        if start >= end {
            return Err(self.report(PlaybackError::InvalidRegion { start, end }));
        }

        self.state.set_region(start, end);
        log::debug!("Region: {} - {} frames", start, end);
        Ok(())
    }

    /// Restrict playback to a time range in seconds
    pub fn set_region_seconds(&self, start: f64, end: f64) -> PlaybackResult<()> {
        let rate = self.sample_rate();
        self.set_region(seconds_to_frames(start, rate), seconds_to_frames(end, rate))
    }

    pub fn clear_region(&self) {
        self.state.clear_region();
        log::debug!("Region cleared");
    }

    /// Current position (frames)
    pub fn position(&self) -> u64 {
        self.state.get_position()
    }

    pub fn position_seconds(&self) -> f64 {
        frames_to_seconds(self.position(), self.sample_rate())
    }

    /// Loaded length (frames)
    pub fn duration_frames(&self) -> u64 {
        self.store.as_ref().map(|s| s.frame_count() as u64).unwrap_or(0)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.store.as_ref().map(|s| s.duration()).unwrap_or(0.0)
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.status()
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn volume(&self) -> f32 {
        self.state.get_volume()
    }

    pub fn is_looping(&self) -> bool {
        self.state.is_looping()
    }

    /// Active region (frames)
    pub fn region(&self) -> Option<(u64, u64)> {
        self.state.region()
    }

    /// Whether an output stream is open
    pub fn is_stream_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn sample_rate(&self) -> u32 {
        self.store.as_ref().map(|s| s.sample_rate()).unwrap_or(0)
    }

    fn report(&self, err: PlaybackError) -> PlaybackError {
        log::warn!("Playback: {}", err);
        self.bus.emit(PlaybackEvent::Error(err.clone()));
        err
    }

    fn close_stream(&mut self) {
        self.state.set_playing(false);
        self.state.set_paused(false);

        // Stream first so the callback is gone before the notifier drains
        if let Some(mut stream) = self.stream.take() {
            if stream.is_active() {
                if let Err(e) = stream.stop() {
                    log::warn!("Failed to stop output stream: {}", e);
                }
            }
            log::debug!("Output stream closed");
        }

        if let Some(mut notifier) = self.notifier.take() {
            notifier.stop();
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.close_stream();
    }
}
