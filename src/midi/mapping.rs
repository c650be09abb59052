//! Strategies for placing note numbers onto LED positions.
//!
//! Every strategy covers the addressable range `[low_note, low_note + led_count)`.
//! Notes outside that range, or mapped past the end of the strip, have no LED.

/// Maps a note number to an LED index.
pub trait KeyMapping: Send + Sync {
    fn led_index(&self, note: u8) -> Option<u32>;

    fn led_count(&self) -> u32;
}

/// Offset of `note` within `[low_note, low_note + led_count)`.
fn offset_in_range(note: u8, low_note: u8, led_count: u32) -> Option<u32> {
    let offset = (note as u32).checked_sub(low_note as u32)?;
    (offset < led_count).then_some(offset)
}

/// `led_index = note - low_note`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearMapping {
    pub low_note: u8,
    pub led_count: u32,
}

impl LinearMapping {
    pub fn new(low_note: u8, led_count: u32) -> Self {
        Self { low_note, led_count }
    }
}

impl KeyMapping for LinearMapping {
    fn led_index(&self, note: u8) -> Option<u32> {
        offset_in_range(note, self.low_note, self.led_count)
    }

    fn led_count(&self) -> u32 {
        self.led_count
    }
}

/// Highest note on the first LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReversedMapping {
    pub low_note: u8,
    pub led_count: u32,
}

impl ReversedMapping {
    pub fn new(low_note: u8, led_count: u32) -> Self {
        Self { low_note, led_count }
    }
}

impl KeyMapping for ReversedMapping {
    fn led_index(&self, note: u8) -> Option<u32> {
        offset_in_range(note, self.low_note, self.led_count).map(|i| self.led_count - 1 - i)
    }

    fn led_count(&self) -> u32 {
        self.led_count
    }
}

/// Spreads consecutive notes `step` LEDs apart, for strips denser than the keyboard.
///
/// Notes whose stepped position falls past the end of the strip are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteppedMapping {
    pub low_note: u8,
    pub led_count: u32,
    pub step: u32,
}

impl SteppedMapping {
    pub fn new(low_note: u8, led_count: u32, step: u32) -> Self {
        Self {
            low_note,
            led_count,
            step: step.max(1),
        }
    }
}

impl KeyMapping for SteppedMapping {
    fn led_index(&self, note: u8) -> Option<u32> {
        let offset = offset_in_range(note, self.low_note, self.led_count)?;
        let index = offset.checked_mul(self.step)?;
        (index < self.led_count).then_some(index)
    }

    fn led_count(&self) -> u32 {
        self.led_count
    }
}
