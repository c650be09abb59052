//! Builds Standard MIDI Files for tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

#[derive(Debug, Clone, Copy)]
pub enum Msg {
    On(u8, u8),
    Off(u8),
    /// Note-on with zero velocity
    SilentOn(u8),
    Tempo(u32),
    Name(&'static str),
}

/// One track as `(absolute_tick, message)` pairs.
pub type TrackSpec = Vec<(u64, Msg)>;

pub fn bpm(bpm: f64) -> u32 {
    (60_000_000.0 / bpm).round() as u32
}

pub fn midi_bytes(ticks_per_beat: u16, tracks: &[TrackSpec]) -> Vec<u8> {
    let format = if tracks.len() == 1 {
        Format::SingleTrack
    } else {
        Format::Parallel
    };
    let mut smf = Smf::new(Header::new(
        format,
        Timing::Metrical(u15::from(ticks_per_beat)),
    ));

    for spec in tracks {
        let mut spec = spec.clone();
        spec.sort_by_key(|(tick, _)| *tick);

        let mut track = Vec::with_capacity(spec.len() + 1);
        let mut last_tick = 0;
        for (tick, msg) in spec {
            let kind = match msg {
                Msg::On(key, vel) => note_on(key, vel),
                Msg::SilentOn(key) => note_on(key, 0),
                Msg::Off(key) => TrackEventKind::Midi {
                    channel: u4::from(0),
                    message: MidiMessage::NoteOff {
                        key: u7::from(key),
                        vel: u7::from(64),
                    },
                },
                Msg::Tempo(us) => TrackEventKind::Meta(MetaMessage::Tempo(u24::from(us))),
                Msg::Name(name) => TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
            };
            track.push(TrackEvent {
                delta: u28::from((tick - last_tick) as u32),
                kind,
            });
            last_tick = tick;
        }
        track.push(TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).expect("in-memory write");
    bytes
}

fn note_on(key: u8, vel: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::from(0),
        message: MidiMessage::NoteOn {
            key: u7::from(key),
            vel: u7::from(vel),
        },
    }
}

pub fn write_midi(dir: &Path, name: &str, ticks_per_beat: u16, tracks: &[TrackSpec]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, midi_bytes(ticks_per_beat, tracks)).expect("write fixture");
    path
}
