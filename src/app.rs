use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;

use sonotate::audio::{PlaybackEngine, PlaybackEvent};
use sonotate::spectrogram::{SpectrogramEngine, SpectrogramEvent, SpectrogramImage, SpectrogramParameters};
use sonotate::types::PlaybackStatus;
use sonotate::SampleStore;

/// Seconds moved per seek key press
pub const SEEK_STEP_SECONDS: f64 = 1.0;

/// Volume change per key press
pub const VOLUME_STEP: f32 = 0.05;

/// Length of the range analysed by one spectrogram request
pub const ANALYSIS_PAGE_SECONDS: f64 = 10.0;

/// Message type for user notifications
#[derive(Debug, Clone)]
pub enum MessageType {
    Info,
    Warning,
    Error,
}

/// User notification message
#[derive(Debug, Clone)]
pub struct Message {
    pub text: String,
    pub msg_type: MessageType,
    pub timestamp: Instant,
}

/// Spectrogram status shown in the UI
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisStatus {
    Idle,
    Running(u8),
    Done { width: usize, height: usize },
    Failed(String),
}

/// Main application state
pub struct App {
    /// Playback engine
    pub playback: PlaybackEngine,

    /// Spectrogram engine
    pub spectrogram: SpectrogramEngine,

    playback_rx: Receiver<PlaybackEvent>,
    spectrogram_rx: Receiver<SpectrogramEvent>,

    /// Loaded audio
    pub store: Option<Arc<SampleStore>>,

    /// Display name of the loaded file
    pub file_name: String,

    /// Base spectrogram parameters (range is filled in per request)
    pub params: SpectrogramParameters,

    /// Transport state as last notified
    pub status: PlaybackStatus,

    /// Position in seconds as last notified
    pub position: f64,

    /// Duration in seconds
    pub duration: f64,

    /// Region start marked with `[`, waiting for `]`
    pub pending_region_start: Option<u64>,

    pub analysis: AnalysisStatus,

    /// Most recent spectrogram
    pub last_image: Option<Arc<SpectrogramImage>>,

    /// Whether to exit the application
    pub should_quit: bool,

    /// Current message to display (if any)
    pub message: Option<Message>,

    /// Message display duration
    pub message_duration: Duration,

    /// Whether to show help view
    pub show_help: bool,
}

impl App {
    /// Create a new application
    pub fn new(playback: PlaybackEngine, spectrogram: SpectrogramEngine, params: SpectrogramParameters) -> Self {
        let playback_rx = playback.subscribe();
        let spectrogram_rx = spectrogram.subscribe();

        Self {
            playback,
            spectrogram,
            playback_rx,
            spectrogram_rx,
            store: None,
            file_name: String::new(),
            params,
            status: PlaybackStatus::Stopped,
            position: 0.0,
            duration: 0.0,
            pending_region_start: None,
            analysis: AnalysisStatus::Idle,
            last_image: None,
            should_quit: false,
            message: None,
            message_duration: Duration::from_secs(3),
            show_help: false,
        }
    }

    /// Load new audio into both engines
    ///
    /// Any running analysis against the previous store is cancelled first.
    pub fn load(&mut self, store: Arc<SampleStore>, file_name: impl Into<String>) {
        self.spectrogram.cancel_and_wait();
        self.spectrogram.clear_cache();
        // Results for the previous store may still be queued
        while self.spectrogram_rx.try_recv().is_ok() {}
        self.analysis = AnalysisStatus::Idle;
        self.last_image = None;
        self.pending_region_start = None;

        self.file_name = file_name.into();
        self.store = Some(store.clone());

        // Failure is published as an event and shown from there
        let _ = self.playback.load(store);
    }

    /// Drain engine notifications into UI state
    pub fn process_events(&mut self) {
        while let Ok(event) = self.playback_rx.try_recv() {
            match event {
                PlaybackEvent::StateChanged(status) => self.status = status,
                PlaybackEvent::Position { seconds, .. } => self.position = seconds,
                PlaybackEvent::Duration { seconds, .. } => self.duration = seconds,
                PlaybackEvent::Finished => {}
                PlaybackEvent::Error(e) => self.show_error(e.to_string()),
            }
        }

        while let Ok(event) = self.spectrogram_rx.try_recv() {
            match event {
                SpectrogramEvent::Started => self.analysis = AnalysisStatus::Running(0),
                SpectrogramEvent::Progress(percent) => self.analysis = AnalysisStatus::Running(percent),
                SpectrogramEvent::Finished(image) => {
                    self.analysis = AnalysisStatus::Done {
                        width: image.width(),
                        height: image.height(),
                    };
                    self.last_image = Some(image);
                }
                SpectrogramEvent::Failed(e) => {
                    self.analysis = AnalysisStatus::Failed(e.to_string());
                    self.show_error(e.to_string());
                }
            }
        }
    }

    /// Space: play or pause
    pub fn toggle_play(&mut self) {
        if self.playback.is_playing() {
            self.playback.pause();
        } else {
            let _ = self.playback.play();
        }
    }

    pub fn stop(&mut self) {
        let _ = self.playback.stop();
    }

    /// Move the cursor by `delta` seconds
    pub fn seek_relative(&mut self, delta: f64) {
        let target = (self.playback.position_seconds() + delta).max(0.0);
        let _ = self.playback.seek_seconds(target);
    }

    pub fn change_volume(&mut self, delta: f32) {
        self.playback.set_volume(self.playback.volume() + delta);
    }

    pub fn toggle_loop(&mut self) {
        self.playback.set_loop(!self.playback.is_looping());
    }

    /// `[`: remember the cursor as region start
    pub fn mark_region_start(&mut self) {
        self.pending_region_start = Some(self.playback.position());
    }

    /// `]`: set the region from the marked start to the cursor
    pub fn mark_region_end(&mut self) {
        let start = self.pending_region_start.unwrap_or(0);
        let end = self.playback.position();
        if self.playback.set_region(start, end).is_ok() {
            self.pending_region_start = None;
        }
    }

    pub fn clear_region(&mut self) {
        self.pending_region_start = None;
        self.playback.clear_region();
    }

    /// Region bounds in seconds
    pub fn region_seconds(&self) -> Option<(f64, f64)> {
        let rate = self.playback.sample_rate() as f64;
        if rate <= 0.0 {
            return None;
        }
        self.playback
            .region()
            .map(|(start, end)| (start as f64 / rate, end as f64 / rate))
    }

    /// Analyse the page of audio containing the cursor
    pub fn analyse_visible(&mut self) {
        let Some(store) = self.store.clone() else {
            self.show_warning("No audio loaded");
            return;
        };

        let page_start = (self.playback.position_seconds() / ANALYSIS_PAGE_SECONDS).floor() * ANALYSIS_PAGE_SECONDS;
        let params = self.params.with_range(page_start, ANALYSIS_PAGE_SECONDS);

        if let Some(image) = self.spectrogram.cached_if_valid(&store, &params) {
            self.analysis = AnalysisStatus::Done {
                width: image.width(),
                height: image.height(),
            };
            self.last_image = Some(image);
            return;
        }

        // Failures come back as events
        let _ = self.spectrogram.compute_async(&store, &params);
    }

    pub fn cancel_analysis(&mut self) {
        if self.spectrogram.is_busy() {
            self.spectrogram.cancel();
            self.analysis = AnalysisStatus::Idle;
            self.show_warning("Analysis cancelled");
        }
    }

    /// Write the last spectrogram to a timestamped PNG
    pub fn export_image(&mut self) {
        let Some(image) = self.last_image.clone() else {
            self.show_warning("No spectrogram to export");
            return;
        };

        let path = export_path();
        match image.write_png(&path) {
            Ok(()) => self.show_info(format!("Saved {}", path.display())),
            Err(e) => self.show_error(format!("Export failed: {:#}", e)),
        }
    }

    /// Toggle help view
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Quit the application
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Check if should quit
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Clear message if it has expired
    pub fn update_message(&mut self) {
        if let Some(ref msg) = self.message {
            if msg.timestamp.elapsed() > self.message_duration {
                self.message = None;
            }
        }
    }

    pub fn show_info(&mut self, text: impl Into<String>) {
        self.set_message(text, MessageType::Info);
    }

    /// Show a warning message
    pub fn show_warning(&mut self, text: impl Into<String>) {
        self.set_message(text, MessageType::Warning);
    }

    /// Show an error message
    pub fn show_error(&mut self, text: impl Into<String>) {
        self.set_message(text, MessageType::Error);
    }

    fn set_message(&mut self, text: impl Into<String>, msg_type: MessageType) {
        self.message = Some(Message {
            text: text.into(),
            msg_type,
            timestamp: Instant::now(),
        });
    }
}

/// `spectrogram-YYYYMMDD-HHMMSS.png` in the current directory
fn export_path() -> PathBuf {
    PathBuf::from(format!("spectrogram-{}.png", Local::now().format("%Y%m%d-%H%M%S")))
}

/// Format seconds as MM:SS.mmm (or HH:MM:SS.mmm)
pub fn format_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let secs = total_ms / 1000;
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, ms)
    } else {
        format!("{:02}:{:02}.{:03}", minutes, seconds, ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonotate::audio::ManualOutput;

    fn test_app() -> (App, sonotate::audio::ManualDriver) {
        let (output, driver) = ManualOutput::new();
        let mut app = App::new(
            PlaybackEngine::new(output),
            SpectrogramEngine::new(),
            SpectrogramParameters::default(),
        );
        let store = Arc::new(SampleStore::new(1000, vec![vec![0.1; 5000]]));
        app.load(store, "test.wav");
        app.process_events();
        (app, driver)
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00.000");
        assert_eq!(format_time(61.5), "01:01.500");
        assert_eq!(format_time(3725.25), "01:02:05.250");
        assert_eq!(format_time(-1.0), "00:00.000");
    }

    #[test]
    fn test_export_path_format() {
        let name = export_path().display().to_string();
        assert!(name.starts_with("spectrogram-"));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), "spectrogram-20240101-120000.png".len());
    }

    #[test]
    fn test_load_updates_duration() {
        let (app, _driver) = test_app();
        assert_eq!(app.duration, 5.0);
        assert_eq!(app.status, PlaybackStatus::Stopped);
        assert!(app.message.is_none());
    }

    #[test]
    fn test_region_marking() {
        let (mut app, _driver) = test_app();

        app.seek_relative(1.0);
        app.mark_region_start();
        app.seek_relative(2.0);
        app.mark_region_end();

        assert_eq!(app.playback.region(), Some((1000, 3000)));
        assert_eq!(app.region_seconds(), Some((1.0, 3.0)));
        assert!(app.pending_region_start.is_none());

        // End before start is rejected and surfaced
        app.mark_region_start();
        app.seek_relative(-2.5);
        app.mark_region_end();
        app.process_events();
        assert_eq!(app.playback.region(), Some((1000, 3000)));
        assert!(matches!(
            app.message.as_ref().map(|m| &m.msg_type),
            Some(MessageType::Error)
        ));

        app.clear_region();
        assert_eq!(app.playback.region(), None);
    }

    #[test]
    fn test_volume_steps_clamp() {
        let (mut app, _driver) = test_app();
        for _ in 0..30 {
            app.change_volume(VOLUME_STEP);
        }
        assert_eq!(app.playback.volume(), 1.0);
        for _ in 0..30 {
            app.change_volume(-VOLUME_STEP);
        }
        assert_eq!(app.playback.volume(), 0.0);
    }

    #[test]
    fn test_reload_discards_previous_result() {
        let (mut app, _driver) = test_app();
        let rx = app.spectrogram.subscribe();

        app.analyse_visible();
        let finished = std::iter::from_fn(|| rx.recv_timeout(Duration::from_secs(30)).ok())
            .any(|event| matches!(event, SpectrogramEvent::Finished(_)));
        assert!(finished);

        let store = Arc::new(SampleStore::new(1000, vec![vec![0.2; 3000]]));
        app.load(store, "other.wav");
        app.process_events();

        assert!(app.last_image.is_none());
        assert_eq!(app.analysis, AnalysisStatus::Idle);
        assert_eq!(app.duration, 3.0);
    }

    #[test]
    fn test_export_without_image_warns() {
        let (mut app, _driver) = test_app();
        app.export_image();
        assert!(matches!(
            app.message.as_ref().map(|m| &m.msg_type),
            Some(MessageType::Warning)
        ));
    }
}
