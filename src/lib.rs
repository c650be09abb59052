//! Plays Standard MIDI Files on an LED strip.
//!
//! A file is parsed into time-ordered note events mapped to LED indices
//! ([`midi`]), replayed against the wall clock by a [`Scheduler`], and drawn
//! by an [`LedRenderer`] that drives either real hardware or an in-memory
//! strip ([`led`]).

pub mod config;
pub mod engine;
pub mod events;
pub mod led;
pub mod midi;
pub mod timing;

pub use config::{AppConfig, LedConfig, Orientation, PlaybackConfig};
pub use engine::{EngineCommand, EngineHandle, EngineUpdate, spawn_engine};
pub use events::{Event, EventKind};
pub use led::{LedRenderer, RenderError};
pub use midi::{ParseError, ParseResult};
pub use timing::{PlaybackStatus, Scheduler, SchedulerError, Status};
