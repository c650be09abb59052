use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smart_leds::RGB8;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{PlaybackState, Status};
use crate::config::{AppConfig, PlaybackConfig};
use crate::events::EventKind;
use crate::led::{self, BLACK, LedRenderer, RenderError};
use crate::midi::{self, KeyMapping, ParseError, ParseResult};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no file loaded")]
    NoFileLoaded,
    #[error("playback is already active")]
    AlreadyActive,
    #[error("playback is already idle")]
    AlreadyIdle,
    #[error("playback is not running")]
    NotPlaying,
    #[error("failed to load file: {0}")]
    ParseFailed(#[from] ParseError),
    #[error("render failed: {0}")]
    RenderFailed(#[from] RenderError),
    #[error("failed to start dispatch worker: {0}")]
    WorkerSpawn(std::io::Error),
}

/// Point-in-time view of the scheduler, cheap to produce from any thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub status: Status,
    pub current_time_ms: f64,
    pub total_duration_ms: f64,
    pub progress_percentage: f64,
    pub filename: Option<String>,
    pub title: Option<String>,
    pub error_message: Option<String>,
}

impl PlaybackStatus {
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string(self)
    }
}

/// What `status()` reads; republished whenever the state changes.
#[derive(Debug, Default)]
struct Published {
    status: Status,
    filename: Option<String>,
    song: Option<Arc<ParseResult>>,
    resumed_at: Option<Instant>,
    paused_elapsed_ms: f64,
    last_error: Option<String>,
}

struct Shared {
    state: Mutex<PlaybackState>,
    renderer: Mutex<Box<dyn LedRenderer>>,
    published: ArcSwap<Published>,
    config: PlaybackConfig,
}

impl Shared {
    fn publish(&self, state: &PlaybackState) {
        self.published.store(Arc::new(Published {
            status: state.status.clone(),
            filename: state.filename.clone(),
            song: state.loaded.clone(),
            resumed_at: state.resumed_at,
            paused_elapsed_ms: state.paused_elapsed_ms,
            last_error: state.last_error.clone(),
        }));
    }

    fn note_color(&self, velocity: u8) -> RGB8 {
        let (r, g, b) = self.config.on_color;
        if !self.config.velocity_sensitive {
            return RGB8 { r, g, b };
        }
        let scale = velocity.min(127) as f32 / 127.0;
        let channel = |c: u8| (c as f32 * scale).round() as u8;
        RGB8 {
            r: channel(r),
            g: channel(g),
            b: channel(b),
        }
    }

    /// Renders every event due at `elapsed_ms` and flushes once if anything changed.
    fn dispatch_due(
        &self,
        state: &mut PlaybackState,
        song: &ParseResult,
        elapsed_ms: f64,
    ) -> Result<usize, RenderError> {
        let mut renderer = self.renderer.lock();
        let mut rendered = 0;

        while let Some(event) = song.events.get(state.cursor) {
            if event.time_ms > elapsed_ms {
                break;
            }
            if let Some(index) = event.led_index {
                let color = match event.kind {
                    EventKind::On => self.note_color(event.velocity),
                    EventKind::Off => BLACK,
                };
                match renderer.set(index as usize, color) {
                    Ok(()) => rendered += 1,
                    Err(RenderError::IndexOutOfRange { index, led_count }) => {
                        warn!(
                            "Skipping note {}: LED {} is past the end of a {} LED strip",
                            event.note, index, led_count
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
            state.cursor += 1;
        }

        if rendered > 0 {
            renderer.flush()?;
        }
        Ok(rendered)
    }

    fn fail(&self, state: &mut PlaybackState, err: &RenderError) {
        error!("Playback halted at event {}: {}", state.cursor, err);
        state.hold(Instant::now());
        state.status = Status::Error(err.to_string());
        state.last_error = Some(err.to_string());
        self.publish(state);
    }

    fn finish(&self, state: &mut PlaybackState, song: &ParseResult) {
        state.resumed_at = None;
        state.paused_elapsed_ms = song.duration_ms;
        match self.renderer.lock().clear_all() {
            Ok(()) => {
                info!("Playback finished");
                state.status = Status::Finished;
                self.publish(state);
            }
            Err(e) => self.fail(state, &e),
        }
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Signals the worker and waits for it to exit.
    fn shutdown(self) {
        // A worker that already returned has dropped its receiver.
        let _ = self.stop_tx.try_send(());
        if self.handle.join().is_err() {
            error!("Dispatch worker panicked");
        }
    }
}

fn dispatch_loop(shared: Arc<Shared>, song: Arc<ParseResult>, stop_rx: Receiver<()>) {
    let poll = Duration::from_millis(shared.config.poll_interval_ms.max(1));

    loop {
        let wait = {
            let mut state = shared.state.lock();
            if state.status != Status::Playing {
                break;
            }

            // Elapsed time comes from the wall clock every pass so sleeps never accumulate error.
            let elapsed_ms = state.elapsed_ms(Instant::now());
            match shared.dispatch_due(&mut state, &song, elapsed_ms) {
                Ok(0) => {}
                Ok(_) => shared.publish(&state),
                Err(e) => {
                    shared.fail(&mut state, &e);
                    break;
                }
            }

            let Some(next) = song.events.get(state.cursor) else {
                shared.finish(&mut state, &song);
                break;
            };
            let until_next = ((next.time_ms - elapsed_ms) / 1000.0).max(0.0);
            Duration::from_secs_f64(until_next).min(poll)
        };

        match stop_rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("Dispatch worker exiting");
}

/// Plays a parsed file against the wall clock, one worker thread at a time.
///
/// Control calls (`load`, `play`, `pause`, `stop`, `seek`) are serialized with
/// each other and may come from any thread. `status` never waits on them or on
/// the dispatch loop.
pub struct Scheduler {
    shared: Arc<Shared>,
    mapping: Box<dyn KeyMapping>,
    worker: Mutex<Option<Worker>>,
}

impl Scheduler {
    pub fn new(
        renderer: Box<dyn LedRenderer>,
        mapping: Box<dyn KeyMapping>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PlaybackState::default()),
                renderer: Mutex::new(renderer),
                published: ArcSwap::from_pointee(Published::default()),
                config,
            }),
            mapping,
            worker: Mutex::new(None),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            led::build_renderer(&config.led),
            config.led.key_mapping(),
            config.playback.clone(),
        )
    }

    /// Parses `path` and makes it the current file.
    ///
    /// A file that fails to parse leaves the previously loaded one in place and
    /// puts the scheduler in the error state.
    pub fn load(&self, path: &Path) -> Result<(), SchedulerError> {
        let mut worker = self.worker.lock();
        self.ensure_inactive()?;
        Self::reap(&mut worker);

        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match midi::parse(path, self.mapping.as_ref()) {
            Ok(song) => {
                info!(
                    "Loaded {} ({} events, {:.1} s, {:.0} BPM)",
                    filename,
                    song.events.len(),
                    song.duration_ms / 1000.0,
                    song.metadata.resolved_tempo_bpm
                );
                self.install(filename, song);
                Ok(())
            }
            Err(e) => {
                error!("Failed to load {}: {}", filename, e);
                let mut state = self.shared.state.lock();
                state.status = Status::Error(e.to_string());
                state.last_error = Some(e.to_string());
                self.shared.publish(&state);
                Err(SchedulerError::ParseFailed(e))
            }
        }
    }

    /// Makes an already parsed file the current one.
    pub fn load_parsed(&self, filename: &str, song: ParseResult) -> Result<(), SchedulerError> {
        let mut worker = self.worker.lock();
        self.ensure_inactive()?;
        Self::reap(&mut worker);
        self.install(filename.to_string(), song);
        Ok(())
    }

    fn install(&self, filename: String, song: ParseResult) {
        let mut state = self.shared.state.lock();
        state.loaded = Some(Arc::new(song));
        state.filename = Some(filename);
        state.rewind();
        state.status = Status::Idle;
        state.last_error = None;

        if let Err(e) = self.shared.renderer.lock().clear_all() {
            warn!("Could not clear LEDs after load: {}", e);
        }
        self.shared.publish(&state);
    }

    pub fn play(&self) -> Result<(), SchedulerError> {
        let mut worker = self.worker.lock();
        if self.shared.state.lock().status == Status::Playing {
            return Err(SchedulerError::AlreadyActive);
        }
        Self::reap(&mut worker);

        let mut state = self.shared.state.lock();
        let song = state.loaded.clone().ok_or(SchedulerError::NoFileLoaded)?;

        let previous = state.status.clone();
        // A failed load after a finished run leaves the cursor at the end.
        if previous.restarts_on_play() || state.cursor >= song.events.len() {
            state.rewind();
        }
        state.resumed_at = Some(Instant::now());
        state.status = Status::Playing;

        let (stop_tx, stop_rx) = channel::bounded(1);
        let shared = self.shared.clone();
        let spawned = std::thread::Builder::new()
            .name("led-dispatch".to_string())
            .spawn(move || dispatch_loop(shared, song, stop_rx));

        match spawned {
            Ok(handle) => {
                info!(
                    "Playing from {:.1} ms (event {})",
                    state.paused_elapsed_ms, state.cursor
                );
                state.last_error = None;
                self.shared.publish(&state);
                *worker = Some(Worker { stop_tx, handle });
                Ok(())
            }
            Err(e) => {
                state.resumed_at = None;
                state.status = previous;
                Err(SchedulerError::WorkerSpawn(e))
            }
        }
    }

    pub fn pause(&self) -> Result<(), SchedulerError> {
        let mut worker = self.worker.lock();
        if self.shared.state.lock().status != Status::Playing {
            return Err(SchedulerError::NotPlaying);
        }
        Self::reap(&mut worker);

        let mut state = self.shared.state.lock();
        // The worker may have finished or failed before it saw the signal.
        if state.status != Status::Playing {
            return Err(SchedulerError::NotPlaying);
        }
        state.hold(Instant::now());
        state.status = Status::Paused;
        info!("Paused at {:.1} ms", state.paused_elapsed_ms);
        self.shared.publish(&state);
        Ok(())
    }

    /// Stops playback and turns every LED off. The worker has exited by the
    /// time this returns.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        let mut worker = self.worker.lock();
        if self.shared.state.lock().status.is_at_rest() {
            return Err(SchedulerError::AlreadyIdle);
        }
        Self::reap(&mut worker);

        let mut state = self.shared.state.lock();
        state.rewind();
        let cleared = self.shared.renderer.lock().clear_all();
        match cleared {
            Ok(()) => {
                state.status = Status::Stopped;
                info!("Stopped");
                self.shared.publish(&state);
                Ok(())
            }
            Err(e) => {
                self.shared.fail(&mut state, &e);
                Err(e.into())
            }
        }
    }

    /// Moves the playback position while not playing and redraws the notes
    /// held at that point.
    pub fn seek(&self, position_ms: f64) -> Result<(), SchedulerError> {
        let mut worker = self.worker.lock();
        self.ensure_not_playing()?;
        Self::reap(&mut worker);

        let mut state = self.shared.state.lock();
        let song = state.loaded.clone().ok_or(SchedulerError::NoFileLoaded)?;

        let position = position_ms.clamp(0.0, song.duration_ms);
        state.cursor = song.events.partition_point(|e| e.time_ms < position);
        state.paused_elapsed_ms = position;
        state.resumed_at = None;
        if state.status != Status::Idle {
            state.status = Status::Paused;
        }

        let mut held: HashMap<u32, u8> = HashMap::new();
        for event in &song.events[..state.cursor] {
            if let Some(index) = event.led_index {
                match event.kind {
                    EventKind::On => held.insert(index, event.velocity),
                    EventKind::Off => held.remove(&index),
                };
            }
        }

        let redrawn = {
            let mut renderer = self.shared.renderer.lock();
            let updates: Vec<(usize, RGB8)> = (0..renderer.led_count())
                .map(|i| {
                    let color = held
                        .get(&(i as u32))
                        .map_or(BLACK, |velocity| self.shared.note_color(*velocity));
                    (i, color)
                })
                .collect();
            renderer.set_many(&updates).and_then(|_| renderer.flush())
        };

        if let Err(e) = redrawn {
            self.shared.fail(&mut state, &e);
            return Err(e.into());
        }

        debug!(
            "Seeked to {:.1} ms (event {}, {} notes held)",
            position,
            state.cursor,
            held.len()
        );
        self.shared.publish(&state);
        Ok(())
    }

    pub fn status(&self) -> PlaybackStatus {
        let published = self.shared.published.load();

        let total_duration_ms = published.song.as_ref().map_or(0.0, |s| s.duration_ms);
        let elapsed_ms = match (&published.status, published.resumed_at) {
            (Status::Playing, Some(resumed_at)) => {
                published.paused_elapsed_ms + resumed_at.elapsed().as_secs_f64() * 1000.0
            }
            _ => published.paused_elapsed_ms,
        };
        let current_time_ms = elapsed_ms.clamp(0.0, total_duration_ms);
        let progress_percentage = if total_duration_ms > 0.0 {
            current_time_ms / total_duration_ms * 100.0
        } else {
            0.0
        };

        PlaybackStatus {
            status: published.status.clone(),
            current_time_ms,
            total_duration_ms,
            progress_percentage,
            filename: published.filename.clone(),
            title: published.song.as_ref().map(|s| s.metadata.title.clone()),
            error_message: published.last_error.clone(),
        }
    }

    /// Copy of the LED frame.
    pub fn frame(&self) -> Vec<RGB8> {
        self.shared.renderer.lock().snapshot()
    }

    /// Index of the next event to dispatch.
    pub fn cursor(&self) -> usize {
        self.shared.state.lock().cursor
    }

    fn ensure_inactive(&self) -> Result<(), SchedulerError> {
        if self.shared.state.lock().status.is_active() {
            return Err(SchedulerError::AlreadyActive);
        }
        Ok(())
    }

    fn ensure_not_playing(&self) -> Result<(), SchedulerError> {
        if self.shared.state.lock().status == Status::Playing {
            return Err(SchedulerError::AlreadyActive);
        }
        Ok(())
    }

    fn reap(worker: &mut Option<Worker>) {
        if let Some(worker) = worker.take() {
            worker.shutdown();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        Self::reap(self.worker.get_mut());
    }
}
