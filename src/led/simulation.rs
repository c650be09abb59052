use smart_leds::RGB8;

use super::{LedFrame, LedRenderer, RenderError};
use crate::config::LedConfig;

/// Keeps the strip in memory only. Used when no hardware is attached or the
/// hardware is disabled.
#[derive(Debug, Clone)]
pub struct SimulationRenderer {
    frame: LedFrame,
    flushes: u64,
}

impl SimulationRenderer {
    pub fn new(config: &LedConfig) -> Self {
        Self {
            frame: LedFrame::new(
                config.led_count as usize,
                config.orientation,
                config.brightness,
            ),
            flushes: 0,
        }
    }

    /// Number of times the frame was flushed.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }
}

impl LedRenderer for SimulationRenderer {
    fn led_count(&self) -> usize {
        self.frame.len()
    }

    fn set(&mut self, index: usize, color: RGB8) -> Result<(), RenderError> {
        self.frame.set(index, color)
    }

    fn clear_all(&mut self) -> Result<(), RenderError> {
        self.frame.clear();
        self.flush()
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        self.flushes += 1;
        Ok(())
    }

    fn snapshot(&self) -> Vec<RGB8> {
        self.frame.pixels().to_vec()
    }
}
