use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    On,
    Off,
}

/// A note change at an absolute position in the performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Milliseconds since the start of the file
    pub time_ms: f64,
    pub kind: EventKind,
    pub note: u8,
    pub velocity: u8,
    /// `None` when the note falls outside the addressable range
    pub led_index: Option<u32>,
}
