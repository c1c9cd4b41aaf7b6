use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rtrb::Consumer;

use crate::audio::callback::RenderEvent;
use crate::audio::state::PlaybackState;
use crate::error::PlaybackError;
use crate::events::EventBus;
use crate::types::{frames_to_seconds, PlaybackStatus, UI_TICK_INTERVAL};

/// Notification published by the playback engine
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    StateChanged(PlaybackStatus),
    Position { frames: u64, seconds: f64 },
    Duration { frames: u64, seconds: f64 },
    /// End of region or file reached with loop disabled
    Finished,
    Error(PlaybackError),
}

impl PlaybackEvent {
    pub fn position(frames: u64, sample_rate: u32) -> Self {
        PlaybackEvent::Position {
            frames,
            seconds: frames_to_seconds(frames, sample_rate),
        }
    }

    pub fn duration(frames: u64, sample_rate: u32) -> Self {
        PlaybackEvent::Duration {
            frames,
            seconds: frames_to_seconds(frames, sample_rate),
        }
    }
}

/// One notifier pass: forwards render events and publishes position ticks
pub struct NotifierLoop {
    consumer: Consumer<RenderEvent>,
    state: Arc<PlaybackState>,
    stream_failed: Arc<AtomicBool>,
    sample_rate: u32,
    bus: EventBus<PlaybackEvent>,
    last_position: u64,
    reported_failure: bool,
}

impl NotifierLoop {
    pub fn new(
        consumer: Consumer<RenderEvent>,
        state: Arc<PlaybackState>,
        stream_failed: Arc<AtomicBool>,
        sample_rate: u32,
        bus: EventBus<PlaybackEvent>,
    ) -> Self {
        let last_position = state.get_position();
        Self {
            consumer,
            state,
            stream_failed,
            sample_rate,
            bus,
            last_position,
            reported_failure: false,
        }
    }

    pub fn tick(&mut self) {
        while let Ok(event) = self.consumer.pop() {
            match event {
                RenderEvent::Finished { position } => {
                    self.last_position = position;
                    self.bus.emit(PlaybackEvent::position(position, self.sample_rate));
                    self.bus.emit(PlaybackEvent::Finished);
                    self.bus.emit(PlaybackEvent::StateChanged(PlaybackStatus::Stopped));
                }
            }
        }

        if !self.reported_failure && self.stream_failed.load(Ordering::Acquire) {
            self.reported_failure = true;
            self.bus.emit(PlaybackEvent::Error(PlaybackError::StreamPlay(
                "output stream reported an error".to_string(),
            )));
        }

        if self.state.is_playing() {
            let position = self.state.get_position();
            if position != self.last_position {
                self.last_position = position;
                self.bus.emit(PlaybackEvent::position(position, self.sample_rate));
            }
        }
    }
}

/// Background thread running [`NotifierLoop`] at the UI refresh cadence
pub struct Notifier {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Notifier {
    pub fn spawn(mut notifier: NotifierLoop) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        let handle = thread::Builder::new()
            .name("playback-notifier".to_string())
            .spawn(move || {
                while thread_running.load(Ordering::Relaxed) {
                    thread::sleep(UI_TICK_INTERVAL);
                    notifier.tick();
                }
                // Deliver anything raised just before shutdown
                notifier.tick();
            })
            .expect("Failed to spawn playback notifier thread");

        Self {
            running,
            thread_handle: Some(handle),
        }
    }

    /// Stop the notifier thread and wait for it to finish
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Playback notifier thread panicked");
            }
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.stop();
    }
}
