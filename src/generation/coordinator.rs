//! Generation coordinator.
//!
//! Runs a [`Renderer`] on a dedicated worker thread, publishes each progress
//! snapshot as the current sample buffer and notifies the caller's observer.
//! A new `generate` call supersedes the previous run: queued requests that
//! are no longer current are skipped, and a running render is stopped the
//! next time it reports progress. Superseded snapshots are never published.
//! A renderer that errors or panics ends its run; the worker keeps serving
//! later requests.

use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use arc_swap::ArcSwapOption;

use super::renderer::Renderer;
use crate::audio::{encode, read_window, WaveFile};
use crate::error::{ErrorCode, RenderError, Result};
use crate::types::{GenerationState, SampleBuffer};

/// Name given to the worker thread.
const WORKER_THREAD_NAME: &str = "pcm-render-worker";

/// Observer invoked with `(progress, handle, track_id)` for every snapshot
/// of the run it was registered with.
type Observer = Box<dyn FnMut(f32, &TrackHandle, u32) + Send>;

/// Message sent to the worker thread.
enum WorkerMessage<S, O> {
    /// Render a song for the given run.
    Generate {
        run: u64,
        song: S,
        options: O,
        observer: Observer,
    },
    /// Request to shut down the worker.
    Shutdown,
}

/// State shared between the coordinator, its handles and the worker.
#[derive(Default)]
struct Shared {
    /// Latest published snapshot.
    buffer: ArcSwapOption<SampleBuffer>,
    /// Id of the current run. Held while publishing so a superseded run
    /// cannot publish after `generate` returns.
    current_run: Mutex<u64>,
    /// Progress ratio of the latest snapshot, as `f32` bits.
    progress: AtomicU32,
    generating: AtomicBool,
}

impl Shared {
    fn lock_run(&self) -> MutexGuard<'_, u64> {
        // The guarded value is a plain counter, so a poisoned lock is still usable.
        self.current_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new run, superseding any previous one.
    fn begin_run(&self) -> u64 {
        let mut current = self.lock_run();
        *current += 1;
        self.generating.store(true, Ordering::Release);
        *current
    }

    /// Invalidates the current run without starting another.
    fn cancel(&self) {
        let mut current = self.lock_run();
        *current += 1;
        self.generating.store(false, Ordering::Release);
    }

    fn is_current(&self, run: u64) -> bool {
        *self.lock_run() == run
    }

    /// Publishes a snapshot if `run` is still current.
    fn publish(&self, run: u64, progress: f32, buffer: SampleBuffer) -> bool {
        let current = self.lock_run();
        if *current != run {
            return false;
        }
        self.buffer.store(Some(Arc::new(buffer)));
        self.progress.store(progress.to_bits(), Ordering::Release);
        true
    }

    /// Marks `run` finished if it is still current.
    fn finish(&self, run: u64) {
        let current = self.lock_run();
        if *current == run {
            self.generating.store(false, Ordering::Release);
        }
    }
}

/// Read access to a coordinator's current track.
///
/// Handles are cheap to clone and stay valid after the coordinator is
/// dropped; they then keep returning the last published snapshot. Observers
/// receive a handle as their "self" argument.
#[derive(Clone)]
pub struct TrackHandle {
    shared: Arc<Shared>,
    track_id: u32,
}

impl TrackHandle {
    /// Returns the track identifier passed to observers.
    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    /// Returns the latest published snapshot, if any.
    pub fn snapshot(&self) -> Option<SampleBuffer> {
        self.shared.buffer.load_full().map(|b| (*b).clone())
    }

    /// Returns the progress ratio of the latest snapshot.
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.shared.progress.load(Ordering::Acquire))
    }

    /// Returns whether a run is in flight.
    pub fn state(&self) -> GenerationState {
        if self.shared.generating.load(Ordering::Acquire) {
            GenerationState::Generating
        } else {
            GenerationState::Idle
        }
    }

    /// Encodes the latest snapshot as a WAVE file.
    ///
    /// Before the first snapshot arrives this is a 44-byte header-only file.
    pub fn create_wave(&self) -> Result<WaveFile> {
        let guard = self.shared.buffer.load();
        match guard.as_deref() {
            Some(buffer) => encode(buffer),
            None => encode(&SampleBuffer::empty()),
        }
    }

    /// Reads `frames` stereo frames at `t` seconds from the latest snapshot.
    ///
    /// Returns `2 * frames` values; see [`crate::audio::read_window`].
    pub fn get_data(&self, t: f64, frames: usize) -> Vec<f32> {
        let guard = self.shared.buffer.load();
        read_window(guard.as_deref(), t, frames)
    }
}

impl std::fmt::Debug for TrackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackHandle")
            .field("track_id", &self.track_id)
            .field("state", &self.state())
            .field("progress", &self.progress())
            .finish()
    }
}

/// Coordinates generation runs on a background worker.
///
/// # Example
///
/// ```
/// use std::sync::mpsc;
/// use std::time::Duration;
/// use pcm_render::generation::{GenerationCoordinator, ToneRenderer};
/// use pcm_render::types::{RenderOptions, ToneSong};
///
/// let song = ToneSong::from_json(
///     r#"{ "bpm": 120, "notes": [{ "start_beat": 0, "beats": 1, "frequency_hz": 440 }] }"#,
/// ).unwrap();
/// let coordinator = GenerationCoordinator::new(ToneRenderer::new()).unwrap();
///
/// let (tx, rx) = mpsc::channel();
/// coordinator.generate(&song, &RenderOptions::default(), move |progress, _, _| {
///     if progress >= 1.0 {
///         tx.send(()).ok();
///     }
/// }).unwrap();
///
/// rx.recv_timeout(Duration::from_secs(10)).unwrap();
/// let wave = coordinator.create_wave().unwrap();
/// assert!(wave.len() > 44);
/// ```
pub struct GenerationCoordinator<R: Renderer> {
    handle: TrackHandle,
    sender: Sender<WorkerMessage<R::Song, R::Options>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl<R: Renderer> GenerationCoordinator<R> {
    /// Creates a coordinator with track id 0.
    pub fn new(renderer: R) -> Result<Self> {
        Self::with_track_id(renderer, 0)
    }

    /// Creates a coordinator whose observers receive `track_id`.
    ///
    /// Starts the worker thread; fails with `WorkerUnavailable` if the thread
    /// cannot be spawned.
    pub fn with_track_id(renderer: R, track_id: u32) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let handle = TrackHandle {
            shared: Arc::new(Shared::default()),
            track_id,
        };
        let worker_handle = handle.clone();

        let thread_handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker_loop(renderer, receiver, worker_handle))
            .map_err(|e| {
                RenderError::with_source(
                    ErrorCode::WorkerUnavailable,
                    "Failed to spawn generation worker",
                    e,
                )
            })?;

        tracing::debug!(track_id, "generation worker started");

        Ok(Self {
            handle,
            sender,
            thread_handle: Some(thread_handle),
        })
    }

    /// Starts a generation run and returns immediately.
    ///
    /// `song` and `options` are cloned and forwarded to the renderer
    /// unchanged. `on_progress` is called on the worker thread with
    /// `(progress, handle, track_id)` after each snapshot of this run has
    /// been published. Any earlier run is superseded: its later snapshots
    /// are discarded. Its observer may still be running, or about to run,
    /// for a snapshot published before this call; it is not called for any
    /// snapshot after that.
    ///
    /// Fails with `WorkerUnavailable` after [`shutdown`](Self::shutdown).
    pub fn generate<F>(&self, song: &R::Song, options: &R::Options, on_progress: F) -> Result<()>
    where
        F: FnMut(f32, &TrackHandle, u32) + Send + 'static,
    {
        let run = self.handle.shared.begin_run();
        tracing::debug!(run, track_id = self.handle.track_id, "generation requested");

        self.sender
            .send(WorkerMessage::Generate {
                run,
                song: song.clone(),
                options: options.clone(),
                observer: Box::new(on_progress),
            })
            .map_err(|_| {
                self.handle.shared.cancel();
                RenderError::worker_unavailable("the worker has shut down")
            })
    }

    /// Cancels the current run, if any. The last published snapshot stays.
    pub fn cancel(&self) {
        self.handle.shared.cancel();
    }

    /// Encodes the latest snapshot as a WAVE file.
    pub fn create_wave(&self) -> Result<WaveFile> {
        self.handle.create_wave()
    }

    /// Reads `frames` stereo frames at `t` seconds from the latest snapshot.
    pub fn get_data(&self, t: f64, frames: usize) -> Vec<f32> {
        self.handle.get_data(t, frames)
    }

    /// Returns the latest published snapshot, if any.
    pub fn snapshot(&self) -> Option<SampleBuffer> {
        self.handle.snapshot()
    }

    /// Returns the progress ratio of the latest snapshot.
    pub fn progress(&self) -> f32 {
        self.handle.progress()
    }

    /// Returns whether a run is in flight.
    pub fn state(&self) -> GenerationState {
        self.handle.state()
    }

    /// Returns the track identifier passed to observers.
    pub fn track_id(&self) -> u32 {
        self.handle.track_id
    }

    /// Returns a read handle sharing this coordinator's buffer.
    pub fn handle(&self) -> TrackHandle {
        self.handle.clone()
    }

    /// Cancels the current run, stops the worker and waits for it to exit.
    ///
    /// Blocks until the renderer returns, which for a cooperative renderer
    /// is its next progress report.
    pub fn shutdown(&mut self) {
        self.handle.shared.cancel();
        self.sender.send(WorkerMessage::Shutdown).ok();
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::warn!("generation worker panicked");
            }
        }
    }
}

impl<R: Renderer> Drop for GenerationCoordinator<R> {
    fn drop(&mut self) {
        // Signal without joining; a renderer that never reports must not
        // block the caller.
        self.handle.shared.cancel();
        self.sender.send(WorkerMessage::Shutdown).ok();
        self.thread_handle.take();
    }
}

/// The main processing loop running in the worker thread.
fn worker_loop<R: Renderer>(
    mut renderer: R,
    receiver: Receiver<WorkerMessage<R::Song, R::Options>>,
    handle: TrackHandle,
) {
    while let Ok(message) = receiver.recv() {
        match message {
            WorkerMessage::Generate {
                run,
                song,
                options,
                mut observer,
            } => {
                if !handle.shared.is_current(run) {
                    tracing::debug!(run, "skipping superseded run");
                    continue;
                }

                let mut notified = 0usize;
                let mut sink = |progress: f32, buffer: SampleBuffer| -> ControlFlow<()> {
                    if !handle.shared.publish(run, progress, buffer) {
                        return ControlFlow::Break(());
                    }
                    if progress >= 1.0 {
                        handle.shared.finish(run);
                    }
                    if !handle.shared.is_current(run) {
                        return ControlFlow::Break(());
                    }
                    notified += 1;
                    observer(progress, &handle, handle.track_id);
                    ControlFlow::Continue(())
                };

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    renderer.render(song, options, &mut sink)
                }));
                match outcome {
                    Ok(Ok(())) => tracing::debug!(run, notified, "render finished"),
                    Ok(Err(e)) => tracing::warn!(run, error = %e, "render failed"),
                    Err(payload) => tracing::warn!(
                        run,
                        panic = panic_message(payload.as_ref()),
                        "render panicked"
                    ),
                }

                handle.shared.finish(run);
            }
            WorkerMessage::Shutdown => break,
        }
    }

    tracing::debug!(track_id = handle.track_id, "generation worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::renderer::ProgressSink;
    use std::time::{Duration, Instant};

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Replays scripted `(progress, samples)` steps, optionally waiting on a
    /// gate before each one.
    struct ScriptRenderer {
        gate: Option<Receiver<()>>,
        stopped: Option<Sender<()>>,
    }

    type Script = Vec<(f32, Vec<i32>)>;

    impl ScriptRenderer {
        fn free() -> Self {
            Self {
                gate: None,
                stopped: None,
            }
        }

        fn gated() -> (Self, Sender<()>, Receiver<()>) {
            let (gate_tx, gate_rx) = mpsc::channel();
            let (stopped_tx, stopped_rx) = mpsc::channel();
            let renderer = Self {
                gate: Some(gate_rx),
                stopped: Some(stopped_tx),
            };
            (renderer, gate_tx, stopped_rx)
        }
    }

    impl Renderer for ScriptRenderer {
        type Song = Script;
        /// Failure message returned after the script completes.
        type Options = Option<String>;

        fn render(
            &mut self,
            song: Script,
            options: Option<String>,
            sink: &mut dyn ProgressSink,
        ) -> Result<()> {
            for (progress, samples) in song {
                if let Some(gate) = &self.gate {
                    if gate.recv().is_err() {
                        return Ok(());
                    }
                }
                let buffer = SampleBuffer::from_interleaved(samples)?;
                if sink.report(progress, buffer).is_break() {
                    if let Some(stopped) = &self.stopped {
                        stopped.send(()).ok();
                    }
                    return Ok(());
                }
            }
            match options {
                Some(reason) => Err(RenderError::render_failed(reason)),
                None => Ok(()),
            }
        }
    }

    /// Panics when asked to render `true`, otherwise reports one final
    /// snapshot.
    struct PanicRenderer;

    impl Renderer for PanicRenderer {
        type Song = bool;
        type Options = ();

        fn render(&mut self, song: bool, _: (), sink: &mut dyn ProgressSink) -> Result<()> {
            if song {
                panic!("renderer blew up");
            }
            sink.report(1.0, SampleBuffer::from_interleaved(vec![3, 4])?);
            Ok(())
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + TIMEOUT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    fn recording_observer(
        label: &'static str,
        tx: Sender<(&'static str, f32, Vec<i32>)>,
    ) -> impl FnMut(f32, &TrackHandle, u32) + Send + 'static {
        move |progress: f32, handle: &TrackHandle, _: u32| {
            let samples = handle.snapshot().map(|b| b.to_vec()).unwrap_or_default();
            tx.send((label, progress, samples)).ok();
        }
    }

    #[test]
    fn reads_before_generation_are_empty() {
        let coordinator = GenerationCoordinator::new(ScriptRenderer::free()).unwrap();

        assert_eq!(coordinator.state(), GenerationState::Idle);
        assert!(coordinator.snapshot().is_none());
        assert_eq!(coordinator.get_data(1.0, 5), vec![0.0; 10]);

        let wave = coordinator.create_wave().unwrap();
        assert_eq!(wave.len(), 44);
        assert_eq!(wave.data_size(), 0);
    }

    #[test]
    fn progress_updates_buffer_in_arrival_order() {
        let coordinator = GenerationCoordinator::new(ScriptRenderer::free()).unwrap();
        let (tx, rx) = mpsc::channel();

        let script = vec![
            (0.25, vec![1, 1]),
            (0.5, vec![1, 1, 2, 2]),
            (1.0, vec![16384, -16384, 0, 32767]),
        ];
        coordinator
            .generate(&script, &None, recording_observer("a", tx))
            .unwrap();

        let events: Vec<_> = (0..3).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
        assert_eq!(events[0], ("a", 0.25, vec![1, 1]));
        assert_eq!(events[1], ("a", 0.5, vec![1, 1, 2, 2]));
        assert_eq!(events[2], ("a", 1.0, vec![16384, -16384, 0, 32767]));

        assert!(wait_until(|| coordinator.state() == GenerationState::Idle));
        assert_eq!(coordinator.progress(), 1.0);
        assert_eq!(coordinator.create_wave().unwrap().len(), 44 + 2 * 4);

        let window = coordinator.get_data(1.0 / 88200.0, 2);
        assert_eq!(&window[..3], &[0.5, -0.5, 0.0]);
    }

    #[test]
    fn observer_receives_track_id_and_live_handle() {
        let coordinator =
            GenerationCoordinator::with_track_id(ScriptRenderer::free(), 7).unwrap();
        let (tx, rx) = mpsc::channel();

        coordinator
            .generate(&vec![(1.0, vec![5, 6, 7, 8])], &None, move |_, handle, id| {
                let wave_len = handle.create_wave().map(|w| w.len()).unwrap_or(0);
                tx.send((id, handle.track_id(), wave_len)).ok();
            })
            .unwrap();

        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), (7, 7, 52));
        assert_eq!(coordinator.track_id(), 7);
    }

    #[test]
    fn superseded_run_stops_publishing() {
        let (renderer, gate, stopped) = ScriptRenderer::gated();
        let coordinator = GenerationCoordinator::new(renderer).unwrap();
        let (tx, rx) = mpsc::channel();

        let first = vec![(0.5, vec![1, 1]), (1.0, vec![2, 2])];
        coordinator
            .generate(&first, &None, recording_observer("first", tx.clone()))
            .unwrap();
        gate.send(()).unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), ("first", 0.5, vec![1, 1]));

        let second = vec![(1.0, vec![9, 9])];
        coordinator
            .generate(&second, &None, recording_observer("second", tx))
            .unwrap();
        assert_eq!(coordinator.state(), GenerationState::Generating);

        // The first run's next report is refused.
        gate.send(()).unwrap();
        stopped.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(coordinator.snapshot().unwrap().as_slice(), &[1, 1]);

        gate.send(()).unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), ("second", 1.0, vec![9, 9]));
        assert!(wait_until(|| coordinator.state() == GenerationState::Idle));
        assert_eq!(coordinator.snapshot().unwrap().as_slice(), &[9, 9]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn only_latest_of_queued_requests_runs() {
        let (renderer, gate, _stopped) = ScriptRenderer::gated();
        let coordinator = GenerationCoordinator::new(renderer).unwrap();
        let (tx, rx) = mpsc::channel();

        for (label, value) in [("a", 1), ("b", 2), ("c", 3)] {
            coordinator
                .generate(
                    &vec![(1.0, vec![value, value])],
                    &None,
                    recording_observer(label, tx.clone()),
                )
                .unwrap();
        }
        drop(tx);
        for _ in 0..3 {
            gate.send(()).unwrap();
        }

        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), ("c", 1.0, vec![3, 3]));
        assert!(wait_until(|| coordinator.state() == GenerationState::Idle));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn failed_render_returns_to_idle_without_notifying() {
        let coordinator = GenerationCoordinator::new(ScriptRenderer::free()).unwrap();
        let (tx, rx) = mpsc::channel();

        coordinator
            .generate(
                &Vec::new(),
                &Some("no voices".to_string()),
                recording_observer("a", tx),
            )
            .unwrap();

        assert!(wait_until(|| coordinator.state() == GenerationState::Idle));
        assert!(rx.try_recv().is_err());
        assert!(coordinator.snapshot().is_none());
    }

    #[test]
    fn odd_length_snapshot_fails_the_run() {
        let coordinator = GenerationCoordinator::new(ScriptRenderer::free()).unwrap();
        let (tx, rx) = mpsc::channel();

        coordinator
            .generate(&vec![(1.0, vec![1, 2, 3])], &None, recording_observer("a", tx))
            .unwrap();

        assert!(wait_until(|| coordinator.state() == GenerationState::Idle));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn renderer_panic_returns_to_idle_and_worker_survives() {
        let coordinator = GenerationCoordinator::new(PanicRenderer).unwrap();
        let (tx, rx) = mpsc::channel();

        coordinator
            .generate(&true, &(), recording_observer("boom", tx.clone()))
            .unwrap();
        assert!(wait_until(|| coordinator.state() == GenerationState::Idle));
        assert!(rx.try_recv().is_err());

        coordinator
            .generate(&false, &(), recording_observer("ok", tx))
            .unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), ("ok", 1.0, vec![3, 4]));
        assert!(wait_until(|| coordinator.state() == GenerationState::Idle));
    }

    #[test]
    fn superseding_after_publish_withholds_notification() {
        let shared = Shared::default();
        let first = shared.begin_run();
        let snapshot = SampleBuffer::from_interleaved(vec![1, 1]).unwrap();
        assert!(shared.publish(first, 0.5, snapshot.clone()));

        // A newer request lands between the publish and the observer call.
        let second = shared.begin_run();
        assert!(!shared.is_current(first));
        assert!(!shared.publish(first, 1.0, snapshot));
        assert!(shared.is_current(second));
        assert_eq!(shared.buffer.load_full().unwrap().as_slice(), &[1, 1]);
    }

    #[test]
    fn cancel_discards_pending_snapshots() {
        let (renderer, gate, stopped) = ScriptRenderer::gated();
        let coordinator = GenerationCoordinator::new(renderer).unwrap();
        let (tx, rx) = mpsc::channel();

        coordinator
            .generate(&vec![(1.0, vec![4, 4])], &None, recording_observer("a", tx))
            .unwrap();
        coordinator.cancel();
        assert_eq!(coordinator.state(), GenerationState::Idle);

        gate.send(()).unwrap();
        // Either the request was skipped or its report was refused.
        let _ = stopped.recv_timeout(Duration::from_millis(200));
        assert!(rx.try_recv().is_err());
        assert!(coordinator.snapshot().is_none());
    }

    #[test]
    fn generate_after_shutdown_fails() {
        let mut coordinator = GenerationCoordinator::new(ScriptRenderer::free()).unwrap();
        coordinator.shutdown();

        let err = coordinator
            .generate(&Vec::new(), &None, |_, _, _| {})
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::WorkerUnavailable);
        assert_eq!(coordinator.state(), GenerationState::Idle);
    }

    #[test]
    fn drop_does_not_wait_for_silent_renderer() {
        let (renderer, gate, _stopped) = ScriptRenderer::gated();
        let coordinator = GenerationCoordinator::new(renderer).unwrap();
        coordinator
            .generate(&vec![(1.0, vec![0, 0])], &None, |_, _, _| {})
            .unwrap();

        let handle = coordinator.handle();
        drop(coordinator);

        assert!(handle.snapshot().is_none());
        drop(gate);
    }

    #[test]
    fn handle_outlives_coordinator() {
        let coordinator = GenerationCoordinator::new(ScriptRenderer::free()).unwrap();
        let (tx, rx) = mpsc::channel();
        coordinator
            .generate(&vec![(1.0, vec![10, 20])], &None, recording_observer("a", tx))
            .unwrap();
        rx.recv_timeout(TIMEOUT).unwrap();

        let handle = coordinator.handle();
        drop(coordinator);
        assert_eq!(handle.snapshot().unwrap().as_slice(), &[10, 20]);
        assert_eq!(handle.create_wave().unwrap().len(), 48);
    }
}
