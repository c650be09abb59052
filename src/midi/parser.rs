use std::path::{Path, PathBuf};

use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::{KeyMapping, TempoMap};
use crate::events::{Event, EventKind};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("invalid MIDI file: {0}")]
    InvalidFormat(String),
    #[error("failed to read MIDI file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub track_count: usize,
    pub ticks_per_beat: u16,
    pub resolved_tempo_bpm: f64,
    /// SMF format number: 0, 1 or 2
    pub format: u16,
    pub title: String,
}

/// A decoded file, ready for playback.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// In-range note events, sorted by time
    pub events: Vec<Event>,
    pub metadata: Metadata,
    pub duration_ms: f64,
}

impl ParseResult {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

struct RawNote {
    tick: u64,
    kind: EventKind,
    note: u8,
    velocity: u8,
}

/// Reads and decodes the Standard MIDI File at `path`.
pub fn parse(path: &Path, mapping: &dyn KeyMapping) -> Result<ParseResult, ParseError> {
    let data = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ParseError::NotFound(path.to_path_buf()),
        _ => ParseError::Io(e),
    })?;

    let fallback_title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");

    parse_bytes(&data, fallback_title, mapping)
}

/// Decodes an in-memory Standard MIDI File. `fallback_title` is used when no
/// track carries a name.
pub fn parse_bytes(
    data: &[u8],
    fallback_title: &str,
    mapping: &dyn KeyMapping,
) -> Result<ParseResult, ParseError> {
    let smf = Smf::parse(data).map_err(|e| ParseError::InvalidFormat(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(_, _) => {
            return Err(ParseError::InvalidFormat(
                "SMPTE timecode timing is not supported".to_string(),
            ));
        }
    };
    if ticks_per_beat == 0 {
        return Err(ParseError::InvalidFormat(
            "ticks per beat must be non-zero".to_string(),
        ));
    }

    let mut title: Option<String> = None;
    let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
    let mut notes: Vec<RawNote> = Vec::new();

    for track in &smf.tracks {
        let mut tick: u64 = 0;

        for event in track.iter() {
            tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_beat)) => {
                    tempo_changes.push((tick, us_per_beat.as_int()));
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) if title.is_none() => {
                    let name = String::from_utf8_lossy(name).trim().to_string();
                    if !name.is_empty() {
                        title = Some(name);
                    }
                }
                TrackEventKind::Midi { message, .. } => {
                    let (kind, key, vel) = match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => {
                            (EventKind::Off, key, vel)
                        }
                        MidiMessage::NoteOn { key, vel } => (EventKind::On, key, vel),
                        MidiMessage::NoteOff { key, vel } => (EventKind::Off, key, vel),
                        _ => continue,
                    };
                    notes.push(RawNote {
                        tick,
                        kind,
                        note: key.as_int(),
                        velocity: vel.as_int(),
                    });
                }
                _ => {}
            }
        }
    }

    let tempo_map = TempoMap::new(ticks_per_beat, tempo_changes);

    let total_notes = notes.len();
    let mut events: Vec<Event> = notes
        .into_iter()
        .filter_map(|raw| {
            let led_index = mapping.led_index(raw.note)?;
            Some(Event {
                time_ms: tempo_map.ticks_to_ms(raw.tick),
                kind: raw.kind,
                note: raw.note,
                velocity: raw.velocity,
                led_index: Some(led_index),
            })
        })
        .collect();

    // stable: equal times keep track order
    events.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));

    let duration_ms = events.last().map_or(0.0, |e| e.time_ms);

    debug!(
        "Parsed {} tracks: {} note events kept, {} outside the LED range, {} tempo changes, {:.1} ms",
        smf.tracks.len(),
        events.len(),
        total_notes - events.len(),
        tempo_map.tempo_changes(),
        duration_ms
    );

    Ok(ParseResult {
        events,
        metadata: Metadata {
            track_count: smf.tracks.len(),
            ticks_per_beat,
            resolved_tempo_bpm: tempo_map.initial_bpm(),
            format: match smf.header.format {
                Format::SingleTrack => 0,
                Format::Parallel => 1,
                Format::Sequential => 2,
            },
            title: title.unwrap_or_else(|| fallback_title.to_string()),
        },
        duration_ms,
    })
}
