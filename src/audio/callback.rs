use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rtrb::Producer;

use crate::audio::state::PlaybackState;
use crate::store::SampleStore;

/// Event raised by the render callback for the notifier thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEvent {
    /// Playback reached the end of the region or file with loop disabled
    Finished { position: u64 },
}

/// Render one hardware buffer of interleaved output
///
/// CRITICAL: This function runs in a real-time audio thread with strict constraints:
/// - NO memory allocations
/// - NO mutex locks (use atomics only)
/// - NO I/O operations
/// - NO blocking calls
///
/// Each shared field is read once per buffer. Any abnormal condition yields
/// silence.
pub fn render_output(
    output: &mut [f32],
    output_channels: usize,
    store: &SampleStore,
    state: &PlaybackState,
    events: &mut Producer<RenderEvent>,
) {
    if output_channels == 0 {
        return;
    }

    if state.is_paused() || !state.is_playing() || store.channel_count() == 0 {
        output.fill(0.0);
        return;
    }

    let start = state.get_position();
    render_from(output, output_channels, store, state, events, start);
}

/// Render starting at `start`, the position read at the top of the buffer
///
/// The new position is committed only if nothing else moved it meanwhile, so
/// a seek or stop issued during the buffer takes effect on the next one.
fn render_from(
    output: &mut [f32],
    output_channels: usize,
    store: &SampleStore,
    state: &PlaybackState,
    events: &mut Producer<RenderEvent>,
    start: u64,
) {
    let num_frames = output.len() / output_channels;
    let store_channels = store.channel_count();
    let frame_count = store.frame_count() as u64;
    let volume = state.get_volume();
    let looping = state.is_looping();
    let region = state.region();
    let mut pos = start;

    for frame_idx in 0..num_frames {
        let frame_start = frame_idx * output_channels;

        // Region rule takes precedence over end-of-file
        if let Some((region_start, region_end)) = region {
            if pos >= region_end {
                if looping {
                    pos = region_start;
                } else {
                    output[frame_start..].fill(0.0);
                    finish(state, events, start, region_start);
                    return;
                }
            }
        }

        if pos >= frame_count {
            if looping && region.is_none() {
                pos = 0;
            } else {
                output[frame_start..].fill(0.0);
                finish(state, events, start, frame_count);
                return;
            }
        }

        let idx = pos as usize;
        for (ch, out) in output[frame_start..frame_start + output_channels]
            .iter_mut()
            .enumerate()
        {
            // Extra device channels repeat the last source channel
            let src = &store.channels()[ch.min(store_channels - 1)];
            *out = src[idx] * volume;
        }
        pos += 1;
    }

    // Trailing partial frame (never produced by sane devices)
    output[num_frames * output_channels..].fill(0.0);

    // Keep a looping position inside its bounds between buffers
    if looping {
        match region {
            Some((region_start, region_end)) if pos >= region_end && region_end <= frame_count => {
                pos = region_start
            }
            None if pos >= frame_count => pos = 0,
            _ => {}
        }
    }

    state.commit_position(start, pos);
}

fn finish(
    state: &PlaybackState,
    events: &mut Producer<RenderEvent>,
    start: u64,
    rest_position: u64,
) {
    // The control thread repositioned us; keep playing from there
    if !state.commit_position(start, rest_position) {
        return;
    }
    state.set_playing(false);
    // Queue full means the notifier is far behind; the state flag still tells the truth
    let _ = events.push(RenderEvent::Finished {
        position: rest_position,
    });
}

/// Create the output callback closure
///
/// This returns a closure that will be called by cpal for each audio buffer
pub fn create_output_callback(
    store: Arc<SampleStore>,
    state: Arc<PlaybackState>,
    mut events: Producer<RenderEvent>,
    output_channels: usize,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
        render_output(data, output_channels, &store, &state, &mut events);
    }
}

/// Error callback for the output stream
///
/// Only raises a flag; the notifier thread reports it.
pub fn create_error_callback(
    stream_failed: Arc<AtomicBool>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |_err| {
        stream_failed.store(true, Ordering::Release);
    }
}
