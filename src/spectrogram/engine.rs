use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::error::{SpectrogramError, SpectrogramResult};
use crate::events::EventBus;
use crate::spectrogram::image::SpectrogramImage;
use crate::spectrogram::params::SpectrogramParameters;
use crate::spectrogram::stft::{analysis_range, compute_excerpt};
use crate::store::SampleStore;

/// Notification published by the spectrogram engine
#[derive(Debug, Clone, PartialEq)]
pub enum SpectrogramEvent {
    /// Worker picked up a job
    Started,
    /// Percent complete
    Progress(u8),
    Finished(Arc<SpectrogramImage>),
    Failed(SpectrogramError),
}

struct Job {
    store: Arc<SampleStore>,
    params: SpectrogramParameters,
}

struct CacheEntry {
    store_id: u64,
    params_key: u64,
    image: Arc<SpectrogramImage>,
}

/// State shared between the engine handle and its worker
struct Shared {
    /// A job is queued or running
    busy: Mutex<bool>,
    idle: Condvar,
    /// Held by the worker from going idle until its result is published
    publish: Mutex<()>,
    cancel: AtomicBool,
    cache: Mutex<Option<CacheEntry>>,
    /// Completed frame-loop runs (cache hits excluded)
    computations: AtomicUsize,
}

impl Shared {
    fn set_idle(&self) {
        let mut busy = self.busy.lock();
        *busy = false;
        self.idle.notify_all();
    }
}

/// Background STFT computation with a single-slot result cache
///
/// One job at a time; requests made while a job is in flight are rejected
/// with [`SpectrogramError::Busy`].
pub struct SpectrogramEngine {
    shared: Arc<Shared>,
    jobs: Option<Sender<Job>>,
    bus: EventBus<SpectrogramEvent>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SpectrogramEngine {
    /// Start the worker thread
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            busy: Mutex::new(false),
            idle: Condvar::new(),
            publish: Mutex::new(()),
            cancel: AtomicBool::new(false),
            cache: Mutex::new(None),
            computations: AtomicUsize::new(0),
        });
        let bus = EventBus::new();
        let (jobs, job_rx) = mpsc::channel();

        let worker_shared = shared.clone();
        let worker_bus = bus.clone();
        let handle = thread::Builder::new()
            .name("spectrogram-worker".to_string())
            .spawn(move || run_worker(job_rx, worker_shared, worker_bus))
            .expect("Failed to spawn spectrogram worker thread");

        Self {
            shared,
            jobs: Some(jobs),
            bus,
            thread_handle: Some(handle),
        }
    }

    /// Register an observer for progress and results
    pub fn subscribe(&self) -> Receiver<SpectrogramEvent> {
        self.bus.subscribe()
    }

    /// Request a spectrogram of `store` with `params`
    ///
    /// A cached result for the same store and parameters is published
    /// immediately without recomputing. Otherwise the job is handed to the
    /// worker and this returns at once; progress and the outcome arrive as
    /// [`SpectrogramEvent`]s.
    pub fn compute_async(
        &self,
        store: &Arc<SampleStore>,
        params: &SpectrogramParameters,
    ) -> SpectrogramResult<()> {
        if let Some(image) = self.cached_if_valid(store, params) {
            log::debug!("Spectrogram cache hit");
            self.bus.emit(SpectrogramEvent::Finished(image));
            return Ok(());
        }

        if let Err(e) = params.validate() {
            return Err(self.report(e));
        }

        {
            let mut busy = self.shared.busy.lock();
            if *busy {
                drop(busy);
                return Err(self.report(SpectrogramError::Busy));
            }
            *busy = true;
        }
        self.shared.cancel.store(false, Ordering::Release);

        let job = Job {
            store: store.clone(),
            params: params.clone(),
        };

        let sent = self.jobs.as_ref().map(|jobs| jobs.send(job).is_ok());
        if sent != Some(true) {
            self.shared.set_idle();
            return Err(self.report(SpectrogramError::WorkerGone));
        }

        log::debug!(
            "Spectrogram requested: {:.2}s from {:.2}s, {} window, {}",
            params.window_duration,
            params.start_time,
            params.window,
            params.color_map
        );
        Ok(())
    }

    /// Ask the running job to stop; it exits without a result
    pub fn cancel(&self) {
        if self.is_busy() {
            self.shared.cancel.store(true, Ordering::Release);
            log::debug!("Spectrogram cancel requested");
        }
    }

    /// Cancel the running job and block until the worker is idle
    ///
    /// Any result of the finished job has been published by the time this
    /// returns. Call before handing the engine a different store.
    pub fn cancel_and_wait(&self) {
        self.cancel();
        let mut busy = self.shared.busy.lock();
        while *busy {
            self.shared.idle.wait(&mut busy);
        }
        drop(busy);
        drop(self.shared.publish.lock());
    }

    /// Cached image for this store and parameter set, if any
    pub fn cached_if_valid(
        &self,
        store: &SampleStore,
        params: &SpectrogramParameters,
    ) -> Option<Arc<SpectrogramImage>> {
        let key = params.cache_key();
        self.shared
            .cache
            .lock()
            .as_ref()
            .filter(|entry| entry.store_id == store.id() && entry.params_key == key)
            .map(|entry| entry.image.clone())
    }

    /// Drop the cached result
    pub fn clear_cache(&self) {
        self.shared.cache.lock().take();
    }

    pub fn is_busy(&self) -> bool {
        *self.shared.busy.lock()
    }

    /// Number of jobs that ran the frame loop to completion
    pub fn computations(&self) -> usize {
        self.shared.computations.load(Ordering::Relaxed)
    }

    fn report(&self, err: SpectrogramError) -> SpectrogramError {
        log::warn!("Spectrogram: {}", err);
        self.bus.emit(SpectrogramEvent::Failed(err.clone()));
        err
    }
}

impl Default for SpectrogramEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SpectrogramEngine {
    fn drop(&mut self) {
        self.shared.cancel.store(true, Ordering::Release);
        // Closing the queue ends the worker loop
        self.jobs.take();
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Spectrogram worker thread panicked");
            }
        }
    }
}

fn run_worker(jobs: Receiver<Job>, shared: Arc<Shared>, bus: EventBus<SpectrogramEvent>) {
    log::debug!("Spectrogram worker started");

    while let Ok(job) = jobs.recv() {
        bus.emit(SpectrogramEvent::Started);

        // Only the analysed range is mixed down
        let range = analysis_range(job.store.frame_count(), job.store.sample_rate(), &job.params);
        let samples = job.store.mixdown_range(range);
        let result = compute_excerpt(
            &samples,
            job.store.sample_rate(),
            &job.params,
            &shared.cancel,
            |percent| bus.emit(SpectrogramEvent::Progress(percent)),
        );
        let store_id = job.store.id();
        drop(samples);
        drop(job.store);

        let event = match result {
            Ok(image) => {
                let image = Arc::new(image);
                *shared.cache.lock() = Some(CacheEntry {
                    store_id,
                    params_key: job.params.cache_key(),
                    image: image.clone(),
                });
                shared.computations.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "Spectrogram computed: {}x{}",
                    image.width(),
                    image.height()
                );
                Some(SpectrogramEvent::Finished(image))
            }
            Err(SpectrogramError::Cancelled) => {
                log::debug!("Spectrogram cancelled");
                None
            }
            Err(e) => {
                log::warn!("Spectrogram failed: {}", e);
                Some(SpectrogramEvent::Failed(e))
            }
        };

        // Idle before publishing so observers can immediately queue the next job
        let _publishing = shared.publish.lock();
        shared.set_idle();
        if let Some(event) = event {
            bus.emit(event);
        }
    }

    log::debug!("Spectrogram worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tone_store(sample_rate: u32, seconds: f64) -> Arc<SampleStore> {
        let frames = (sample_rate as f64 * seconds) as usize;
        let samples = (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        Arc::new(SampleStore::new(sample_rate, vec![samples]))
    }

    /// Collect events up to and including the first terminal one
    fn wait_terminal(rx: &Receiver<SpectrogramEvent>) -> Vec<SpectrogramEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(30)) {
            let terminal = matches!(
                event,
                SpectrogramEvent::Finished(_) | SpectrogramEvent::Failed(_)
            );
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    fn finished_image(events: &[SpectrogramEvent]) -> Arc<SpectrogramImage> {
        match events.last() {
            Some(SpectrogramEvent::Finished(image)) => image.clone(),
            other => panic!("expected Finished, got {:?}", other),
        }
    }

    #[test]
    fn test_compute_then_cache_hit() {
        let engine = SpectrogramEngine::new();
        let rx = engine.subscribe();
        let store = tone_store(16000, 1.0);
        let params = SpectrogramParameters::default();

        engine.compute_async(&store, &params).unwrap();
        let events = wait_terminal(&rx);
        assert_eq!(events.first(), Some(&SpectrogramEvent::Started));
        assert!(events.contains(&SpectrogramEvent::Progress(100)));
        let first = finished_image(&events);
        assert_eq!(engine.computations(), 1);

        engine.compute_async(&store, &params).unwrap();
        let events = wait_terminal(&rx);
        assert_eq!(events.len(), 1);
        let second = finished_image(&events);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.computations(), 1);
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_range_request_on_long_stereo_store() {
        let engine = SpectrogramEngine::new();
        let rx = engine.subscribe();
        let frames = 8000 * 60;
        let store = Arc::new(SampleStore::new(
            8000,
            vec![vec![0.25; frames], vec![-0.25; frames]],
        ));
        let params = SpectrogramParameters::default().with_range(30.0, 2.0);

        engine.compute_async(&store, &params).unwrap();
        let image = finished_image(&wait_terminal(&rx));

        // 2 s at 8 kHz: 200-sample window, 40-sample hop
        assert_eq!(image.width(), (16000 - 200) / 40 + 1);
        assert_eq!(image.params_key(), params.cache_key());
    }

    #[test]
    fn test_cache_keyed_by_store_and_params() {
        let engine = SpectrogramEngine::new();
        let rx = engine.subscribe();
        let store = tone_store(16000, 0.5);
        let params = SpectrogramParameters::default();

        engine.compute_async(&store, &params).unwrap();
        wait_terminal(&rx);

        assert!(engine.cached_if_valid(&store, &params).is_some());

        let other_store = tone_store(16000, 0.5);
        assert!(engine.cached_if_valid(&other_store, &params).is_none());

        let other_params = SpectrogramParameters {
            dynamic_range: 50.0,
            ..params.clone()
        };
        assert!(engine.cached_if_valid(&store, &other_params).is_none());

        engine.clear_cache();
        assert!(engine.cached_if_valid(&store, &params).is_none());
    }

    #[test]
    fn test_busy_while_running() {
        let engine = SpectrogramEngine::new();
        let rx = engine.subscribe();
        let store = tone_store(44100, 20.0);
        let slow = SpectrogramParameters {
            time_step: 0.001,
            ..Default::default()
        };

        engine.compute_async(&store, &slow).unwrap();
        let other = SpectrogramParameters::default();
        assert_eq!(
            engine.compute_async(&store, &other),
            Err(SpectrogramError::Busy)
        );

        engine.cancel_and_wait();
        assert!(!engine.is_busy());
        assert!(rx
            .try_iter()
            .any(|e| e == SpectrogramEvent::Failed(SpectrogramError::Busy)));
    }

    #[test]
    fn test_cancel_yields_no_result() {
        let engine = SpectrogramEngine::new();
        let rx = engine.subscribe();
        let store = tone_store(44100, 20.0);
        let params = SpectrogramParameters {
            time_step: 0.001,
            ..Default::default()
        };

        engine.compute_async(&store, &params).unwrap();

        // Wait for the frame loop to start
        loop {
            match rx.recv_timeout(Duration::from_secs(30)) {
                Ok(SpectrogramEvent::Progress(_)) => break,
                Ok(_) => continue,
                Err(_) => panic!("no progress reported"),
            }
        }

        engine.cancel_and_wait();

        assert!(!rx
            .try_iter()
            .any(|e| matches!(e, SpectrogramEvent::Finished(_) | SpectrogramEvent::Failed(_))));
        assert!(engine.cached_if_valid(&store, &params).is_none());
        assert_eq!(engine.computations(), 0);

        // Engine is usable again
        let short = tone_store(16000, 0.5);
        engine.compute_async(&short, &SpectrogramParameters::default()).unwrap();
        finished_image(&wait_terminal(&rx));
    }

    #[test]
    fn test_failure_is_published_and_not_cached() {
        let engine = SpectrogramEngine::new();
        let rx = engine.subscribe();
        let store = tone_store(16000, 0.01);
        let params = SpectrogramParameters::default();

        engine.compute_async(&store, &params).unwrap();
        let events = wait_terminal(&rx);

        assert!(matches!(
            events.last(),
            Some(SpectrogramEvent::Failed(SpectrogramError::AudioTooShort { .. }))
        ));
        assert!(engine.cached_if_valid(&store, &params).is_none());
    }

    #[test]
    fn test_invalid_parameters_rejected_up_front() {
        let engine = SpectrogramEngine::new();
        let rx = engine.subscribe();
        let store = tone_store(16000, 0.5);
        let params = SpectrogramParameters {
            dynamic_range: -1.0,
            ..Default::default()
        };

        assert!(matches!(
            engine.compute_async(&store, &params),
            Err(SpectrogramError::InvalidParameters(_))
        ));
        assert!(matches!(
            rx.try_recv(),
            Ok(SpectrogramEvent::Failed(SpectrogramError::InvalidParameters(_)))
        ));
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_drop_stops_running_job() {
        let engine = SpectrogramEngine::new();
        let store = tone_store(44100, 20.0);
        let params = SpectrogramParameters {
            time_step: 0.001,
            ..Default::default()
        };
        engine.compute_async(&store, &params).unwrap();
        drop(engine);
    }
}
