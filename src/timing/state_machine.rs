use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::midi::ParseResult;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Idle,
    Playing,
    Paused,
    Stopped,
    Finished,
    Error(String),
}

impl Status {
    /// A session is active while a worker owns it or could resume it.
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Playing | Status::Paused)
    }

    /// `play()` from these states starts over from the top.
    pub fn restarts_on_play(&self) -> bool {
        matches!(self, Status::Stopped | Status::Finished)
    }

    pub fn is_at_rest(&self) -> bool {
        matches!(self, Status::Idle | Status::Stopped | Status::Finished)
    }
}

/// Everything the scheduler knows about the current session.
///
/// Elapsed time is `paused_elapsed_ms` plus the wall clock time since
/// `resumed_at`, so it stays continuous across pauses and is recomputed from
/// the clock on every read.
#[derive(Debug, Default)]
pub struct PlaybackState {
    pub status: Status,
    pub filename: Option<String>,
    pub loaded: Option<Arc<ParseResult>>,
    /// Wall clock instant of the last `play()`; `None` unless playing
    pub resumed_at: Option<Instant>,
    pub paused_elapsed_ms: f64,
    /// Index of the next undispatched event
    pub cursor: usize,
    pub last_error: Option<String>,
}

impl PlaybackState {
    pub fn elapsed_ms(&self, now: Instant) -> f64 {
        match (&self.status, self.resumed_at) {
            (Status::Playing, Some(resumed_at)) => {
                self.paused_elapsed_ms
                    + now.saturating_duration_since(resumed_at).as_secs_f64() * 1000.0
            }
            _ => self.paused_elapsed_ms,
        }
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.paused_elapsed_ms = 0.0;
        self.resumed_at = None;
    }

    /// Freezes the clock at `now`.
    pub fn hold(&mut self, now: Instant) {
        self.paused_elapsed_ms = self.elapsed_ms(now);
        self.resumed_at = None;
    }
}
