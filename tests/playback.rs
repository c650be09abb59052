mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{Msg, TrackSpec, write_midi};
use keylight::config::{LedConfig, PlaybackConfig};
use keylight::led::{BLACK, LedRenderer, RenderError, SimulationRenderer};
use keylight::midi::LinearMapping;
use keylight::{Scheduler, SchedulerError, Status};
use parking_lot::Mutex;
use smart_leds::RGB8;
use tempfile::TempDir;

const LOW_NOTE: u8 = 60;
const LED_COUNT: u32 = 16;

/// Simulation renderer that also logs every `set` call.
struct LoggingRenderer {
    inner: SimulationRenderer,
    log: Arc<Mutex<Vec<(usize, bool)>>>,
}

impl LedRenderer for LoggingRenderer {
    fn led_count(&self) -> usize {
        self.inner.led_count()
    }

    fn set(&mut self, index: usize, color: RGB8) -> Result<(), RenderError> {
        self.inner.set(index, color)?;
        self.log.lock().push((index, color != BLACK));
        Ok(())
    }

    fn clear_all(&mut self) -> Result<(), RenderError> {
        self.inner.clear_all()
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        self.inner.flush()
    }

    fn snapshot(&self) -> Vec<RGB8> {
        self.inner.snapshot()
    }
}

fn led_config() -> LedConfig {
    LedConfig {
        led_count: LED_COUNT,
        low_note: LOW_NOTE,
        brightness: 1.0,
        ..LedConfig::default()
    }
}

fn playback_config() -> PlaybackConfig {
    PlaybackConfig {
        poll_interval_ms: 2,
        ..PlaybackConfig::default()
    }
}

fn logging_scheduler() -> (Scheduler, Arc<Mutex<Vec<(usize, bool)>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let renderer = LoggingRenderer {
        inner: SimulationRenderer::new(&led_config()),
        log: log.clone(),
    };
    let scheduler = Scheduler::new(
        Box::new(renderer),
        Box::new(LinearMapping::new(LOW_NOTE, LED_COUNT)),
        playback_config(),
    );
    (scheduler, log)
}

/// Sixteen staggered notes over roughly 300 ms at 120 BPM, 96 ticks per beat.
fn arpeggio(dir: &TempDir) -> PathBuf {
    let mut track: TrackSpec = Vec::new();
    for i in 0..16u64 {
        let note = LOW_NOTE + i as u8;
        track.push((i * 3, Msg::On(note, 100)));
        track.push((i * 3 + 10, Msg::Off(note)));
    }
    write_midi(dir.path(), "arpeggio.mid", 96, &[track])
}

/// The expected `set` log for `arpeggio`: LED index and whether it lit up.
fn arpeggio_log() -> Vec<(usize, bool)> {
    let mut events: Vec<(u64, usize, bool)> = Vec::new();
    for i in 0..16u64 {
        events.push((i * 3, i as usize, true));
        events.push((i * 3 + 10, i as usize, false));
    }
    events.sort_by_key(|(tick, _, _)| *tick);
    events.into_iter().map(|(_, index, on)| (index, on)).collect()
}

fn wait_for(scheduler: &Scheduler, expected: Status) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while scheduler.status().status != expected {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {expected:?}, at {:?}",
            scheduler.status()
        );
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn uninterrupted_run_fires_every_event_once() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, log) = logging_scheduler();
    scheduler.load(&arpeggio(&dir)).unwrap();

    scheduler.play().unwrap();
    wait_for(&scheduler, Status::Finished);

    assert_eq!(*log.lock(), arpeggio_log());
    assert_eq!(scheduler.frame(), vec![BLACK; LED_COUNT as usize]);
}

#[test]
fn pause_and_resume_neither_skip_nor_repeat() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, log) = logging_scheduler();
    scheduler.load(&arpeggio(&dir)).unwrap();

    scheduler.play().unwrap();
    thread::sleep(Duration::from_millis(60));
    scheduler.pause().unwrap();

    let paused = scheduler.status();
    assert_eq!(paused.status, Status::Paused);
    let dispatched = log.lock().len();
    thread::sleep(Duration::from_millis(40));
    assert_eq!(log.lock().len(), dispatched, "paused playback kept rendering");
    assert_eq!(scheduler.status().current_time_ms, paused.current_time_ms);

    scheduler.play().unwrap();
    scheduler.pause().unwrap();
    scheduler.play().unwrap();
    wait_for(&scheduler, Status::Finished);

    assert_eq!(*log.lock(), arpeggio_log());
}

#[test]
fn stop_turns_everything_off() {
    let dir = tempfile::tempdir().unwrap();
    let sustained = vec![
        (0, Msg::On(LOW_NOTE, 127)),
        (0, Msg::On(LOW_NOTE + 5, 127)),
        (96 * 20, Msg::Off(LOW_NOTE)),
    ];
    let path = write_midi(dir.path(), "sustained.mid", 96, &[sustained]);

    let scheduler = Scheduler::new(
        Box::new(SimulationRenderer::new(&led_config())),
        Box::new(LinearMapping::new(LOW_NOTE, LED_COUNT)),
        playback_config(),
    );
    scheduler.load(&path).unwrap();
    scheduler.play().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while scheduler.cursor() < 2 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(2));
    }
    assert_ne!(scheduler.frame()[5], BLACK);

    scheduler.stop().unwrap();
    assert_eq!(scheduler.frame(), vec![BLACK; LED_COUNT as usize]);
    assert_eq!(scheduler.cursor(), 0);

    let status = scheduler.status();
    assert_eq!(status.status, Status::Stopped);
    assert_eq!(status.current_time_ms, 0.0);
    assert_eq!(status.progress_percentage, 0.0);

    // the worker is gone: nothing lights up again
    thread::sleep(Duration::from_millis(20));
    assert_eq!(scheduler.frame(), vec![BLACK; LED_COUNT as usize]);
}

#[test]
fn play_after_finish_starts_over() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, log) = logging_scheduler();
    scheduler.load(&arpeggio(&dir)).unwrap();

    scheduler.play().unwrap();
    wait_for(&scheduler, Status::Finished);
    scheduler.play().unwrap();
    wait_for(&scheduler, Status::Finished);

    let expected: Vec<_> = arpeggio_log().into_iter().cycle().take(64).collect();
    assert_eq!(*log.lock(), expected);
}

#[test]
fn play_without_file_stays_idle() {
    let (scheduler, log) = logging_scheduler();
    assert!(matches!(scheduler.play(), Err(SchedulerError::NoFileLoaded)));
    assert_eq!(scheduler.status().status, Status::Idle);
    assert!(log.lock().is_empty());
}

#[test]
fn failed_load_keeps_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, _log) = logging_scheduler();
    scheduler.load(&arpeggio(&dir)).unwrap();

    let garbage = dir.path().join("garbage.mid");
    std::fs::write(&garbage, b"MThd nonsense").unwrap();
    assert!(matches!(
        scheduler.load(&garbage),
        Err(SchedulerError::ParseFailed(_))
    ));

    let status = scheduler.status();
    assert!(matches!(status.status, Status::Error(_)));
    assert_eq!(status.filename.as_deref(), Some("arpeggio.mid"));
    assert!(status.error_message.is_some());

    scheduler.play().unwrap();
    wait_for(&scheduler, Status::Finished);
    assert_eq!(scheduler.status().error_message, None);
}

#[test]
fn failed_load_after_finish_replays_from_the_start() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, log) = logging_scheduler();
    scheduler.load(&arpeggio(&dir)).unwrap();
    scheduler.play().unwrap();
    wait_for(&scheduler, Status::Finished);

    let garbage = dir.path().join("garbage.mid");
    std::fs::write(&garbage, b"MThd nonsense").unwrap();
    assert!(scheduler.load(&garbage).is_err());
    assert!(matches!(scheduler.status().status, Status::Error(_)));

    let started = Instant::now();
    scheduler.play().unwrap();
    assert!(scheduler.status().current_time_ms < 100.0);
    wait_for(&scheduler, Status::Finished);
    assert!(started.elapsed() >= Duration::from_millis(200));

    let expected: Vec<_> = arpeggio_log().into_iter().cycle().take(64).collect();
    assert_eq!(*log.lock(), expected);
}

#[test]
fn status_is_readable_while_playing() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = Arc::new(Scheduler::new(
        Box::new(SimulationRenderer::new(&led_config())),
        Box::new(LinearMapping::new(LOW_NOTE, LED_COUNT)),
        playback_config(),
    ));
    scheduler.load(&arpeggio(&dir)).unwrap();
    scheduler.play().unwrap();

    let reader = {
        let scheduler = scheduler.clone();
        thread::spawn(move || {
            let mut last = 0.0;
            for _ in 0..50 {
                let status = scheduler.status();
                assert!(status.current_time_ms >= last);
                assert!(status.progress_percentage <= 100.0);
                last = status.current_time_ms;
                thread::sleep(Duration::from_millis(1));
            }
        })
    };
    reader.join().unwrap();

    wait_for(&scheduler, Status::Finished);
    let status = scheduler.status();
    assert_eq!(status.current_time_ms, status.total_duration_ms);
    assert_eq!(status.progress_percentage, 100.0);
}

#[test]
fn stop_from_any_thread() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, _log) = logging_scheduler();
    let scheduler = Arc::new(scheduler);
    scheduler.load(&arpeggio(&dir)).unwrap();
    scheduler.play().unwrap();

    let stopper = {
        let scheduler = scheduler.clone();
        thread::spawn(move || scheduler.stop())
    };
    stopper.join().unwrap().unwrap();

    assert_eq!(scheduler.status().status, Status::Stopped);
    assert!(matches!(scheduler.stop(), Err(SchedulerError::AlreadyIdle)));
}
