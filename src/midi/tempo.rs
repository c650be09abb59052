/// Microseconds per quarter note assumed until the first tempo event (120 BPM).
pub const DEFAULT_TEMPO_US: u32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoSegment {
    tick: u64,
    /// Milliseconds elapsed at `tick`
    start_ms: f64,
    us_per_beat: u32,
}

/// Converts absolute ticks to milliseconds across every tempo change in a file.
///
/// Time accumulates segment by segment, so a tempo change only affects the
/// ticks that follow it.
#[derive(Debug, Clone)]
pub struct TempoMap {
    ticks_per_beat: u16,
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    /// `changes` are `(absolute_tick, us_per_beat)` in arrival order. When two
    /// changes share a tick the later one wins.
    pub fn new(ticks_per_beat: u16, mut changes: Vec<(u64, u32)>) -> Self {
        changes.sort_by_key(|(tick, _)| *tick);

        let mut map = Self {
            ticks_per_beat: ticks_per_beat.max(1),
            segments: vec![TempoSegment {
                tick: 0,
                start_ms: 0.0,
                us_per_beat: DEFAULT_TEMPO_US,
            }],
        };

        for (tick, us_per_beat) in changes {
            if us_per_beat == 0 {
                continue;
            }
            let start_ms = map.ticks_to_ms(tick);
            match map.segments.last_mut() {
                Some(last) if last.tick == tick => last.us_per_beat = us_per_beat,
                _ => map.segments.push(TempoSegment {
                    tick,
                    start_ms,
                    us_per_beat,
                }),
            }
        }

        map
    }

    pub fn ticks_to_ms(&self, tick: u64) -> f64 {
        let idx = self
            .segments
            .partition_point(|s| s.tick <= tick)
            .saturating_sub(1);
        let segment = &self.segments[idx];
        let beats = (tick - segment.tick) as f64 / self.ticks_per_beat as f64;
        segment.start_ms + beats * (segment.us_per_beat as f64 / 1000.0)
    }

    /// Tempo in effect at tick 0.
    pub fn initial_bpm(&self) -> f64 {
        60_000_000.0 / self.segments[0].us_per_beat as f64
    }

    pub fn tempo_changes(&self) -> usize {
        self.segments.len() - 1
    }
}
