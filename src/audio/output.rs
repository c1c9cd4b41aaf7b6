//! Output backends for the playback engine
//!
//! `CpalOutput` drives a real device. `ManualOutput` hands the render
//! callback to the caller, who pulls buffers at their own pace (offline
//! rendering, tests).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::Mutex;
use rtrb::Producer;

use crate::audio::callback::{create_error_callback, create_output_callback, render_output, RenderEvent};
use crate::audio::device::{check_output_support, device_name, get_default_output_device, output_stream_config};
use crate::audio::state::PlaybackState;
use crate::error::{PlaybackError, PlaybackResult};
use crate::store::SampleStore;

/// Everything the render callback needs, moved into the stream on open
pub struct RenderContext {
    pub store: Arc<SampleStore>,
    pub state: Arc<PlaybackState>,
    pub events: Producer<RenderEvent>,
    pub stream_failed: Arc<AtomicBool>,
}

/// Opens output streams sized to a sample store
pub trait AudioOutput {
    fn open(&mut self, ctx: RenderContext) -> PlaybackResult<Box<dyn OutputStream>>;
}

/// An open output stream; dropping it stops the callback
pub trait OutputStream {
    fn start(&mut self) -> PlaybackResult<()>;
    fn stop(&mut self) -> PlaybackResult<()>;
    fn is_active(&self) -> bool;
}

/// Default cpal output device
pub struct CpalOutput {
    /// Requested hardware buffer size (None = device default)
    buffer_frames: Option<u32>,
}

impl CpalOutput {
    pub fn new(buffer_frames: Option<u32>) -> Self {
        Self { buffer_frames }
    }
}

impl AudioOutput for CpalOutput {
    fn open(&mut self, ctx: RenderContext) -> PlaybackResult<Box<dyn OutputStream>> {
        let device = get_default_output_device()?;
        let channels = ctx.store.channel_count() as u16;
        let sample_rate = ctx.store.sample_rate();

        check_output_support(&device, channels, sample_rate)?;

        let config = output_stream_config(channels, sample_rate, self.buffer_frames);

        let output_callback = create_output_callback(ctx.store, ctx.state, ctx.events, channels as usize);
        let error_callback = create_error_callback(ctx.stream_failed);

        let stream = device
            .build_output_stream(&config, output_callback, error_callback, None)
            .map_err(|e| PlaybackError::StreamBuild(e.to_string()))?;

        log::info!(
            "Opened output stream on '{}': {}ch @ {}Hz ({:?})",
            device_name(&device),
            channels,
            sample_rate,
            config.buffer_size
        );

        Ok(Box::new(CpalStream {
            stream,
            active: false,
        }))
    }
}

struct CpalStream {
    stream: cpal::Stream,
    active: bool,
}

impl OutputStream for CpalStream {
    fn start(&mut self) -> PlaybackResult<()> {
        self.stream
            .play()
            .map_err(|e| PlaybackError::StreamPlay(e.to_string()))?;
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) -> PlaybackResult<()> {
        self.stream
            .pause()
            .map_err(|e| PlaybackError::StreamPlay(e.to_string()))?;
        self.active = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

struct ManualSlot {
    ctx: RenderContext,
    channels: usize,
    active: bool,
}

type SharedSlot = Arc<Mutex<Option<ManualSlot>>>;

/// Output whose buffers are pulled by a [`ManualDriver`]
pub struct ManualOutput {
    slot: SharedSlot,
    fail_open: bool,
}

/// Caller side of a [`ManualOutput`]
#[derive(Clone)]
pub struct ManualDriver {
    slot: SharedSlot,
}

impl ManualOutput {
    pub fn new() -> (Self, ManualDriver) {
        let slot: SharedSlot = Arc::new(Mutex::new(None));
        (
            Self {
                slot: slot.clone(),
                fail_open: false,
            },
            ManualDriver { slot },
        )
    }

    /// An output that behaves like a machine without audio hardware
    pub fn unavailable() -> (Self, ManualDriver) {
        let (mut output, driver) = Self::new();
        output.fail_open = true;
        (output, driver)
    }
}

impl AudioOutput for ManualOutput {
    fn open(&mut self, ctx: RenderContext) -> PlaybackResult<Box<dyn OutputStream>> {
        if self.fail_open {
            return Err(PlaybackError::NoOutputDevice);
        }

        let channels = ctx.store.channel_count();
        *self.slot.lock() = Some(ManualSlot {
            ctx,
            channels,
            active: false,
        });

        Ok(Box::new(ManualStream {
            slot: self.slot.clone(),
        }))
    }
}

struct ManualStream {
    slot: SharedSlot,
}

impl OutputStream for ManualStream {
    fn start(&mut self) -> PlaybackResult<()> {
        if let Some(slot) = self.slot.lock().as_mut() {
            slot.active = true;
        }
        Ok(())
    }

    fn stop(&mut self) -> PlaybackResult<()> {
        if let Some(slot) = self.slot.lock().as_mut() {
            slot.active = false;
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.slot.lock().as_ref().map(|s| s.active).unwrap_or(false)
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

impl ManualDriver {
    /// Run the callback for one buffer of `frames` frames
    ///
    /// Returns the interleaved output, or `None` when no stream is open or the
    /// stream is stopped (a stopped device does not call back).
    pub fn render(&self, frames: usize) -> Option<Vec<f32>> {
        let mut guard = self.slot.lock();
        let slot = guard.as_mut()?;
        if !slot.active {
            return None;
        }

        let mut buffer = vec![0.0f32; frames * slot.channels];
        render_output(
            &mut buffer,
            slot.channels,
            &slot.ctx.store,
            &slot.ctx.state,
            &mut slot.ctx.events,
        );
        Some(buffer)
    }

    /// Render `total_frames` in buffers of `buffer_frames`, concatenated
    pub fn render_for(&self, total_frames: usize, buffer_frames: usize) -> Vec<f32> {
        let mut rendered = Vec::new();
        let mut remaining = total_frames;
        while remaining > 0 {
            let frames = remaining.min(buffer_frames.max(1));
            match self.render(frames) {
                Some(buffer) => rendered.extend_from_slice(&buffer),
                None => break,
            }
            remaining -= frames;
        }
        rendered
    }

    /// Whether a stream is currently open
    pub fn is_open(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Simulate a device fault reported by the backend
    pub fn raise_stream_error(&self) {
        if let Some(slot) = self.slot.lock().as_ref() {
            slot.ctx.stream_failed.store(true, Ordering::Release);
        }
    }
}
