use smart_leds::RGB8;

use super::RenderError;
use crate::config::Orientation;

pub const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// Physical color state of a strip, stored in wire order.
///
/// Logical indices go through the orientation transform and colors through
/// brightness scaling on the way in.
#[derive(Debug, Clone)]
pub struct LedFrame {
    pixels: Vec<RGB8>,
    orientation: Orientation,
    brightness: f32,
}

impl LedFrame {
    pub fn new(led_count: usize, orientation: Orientation, brightness: f32) -> Self {
        Self {
            pixels: vec![BLACK; led_count],
            orientation,
            brightness: brightness.max(0.0),
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn set(&mut self, index: usize, color: RGB8) -> Result<(), RenderError> {
        let led_count = self.pixels.len();
        if index >= led_count {
            return Err(RenderError::IndexOutOfRange { index, led_count });
        }

        let physical = match self.orientation {
            Orientation::Normal => index,
            Orientation::Reversed => led_count - 1 - index,
        };
        self.pixels[physical] = self.scale(color);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.pixels.fill(BLACK);
    }

    pub fn pixels(&self) -> &[RGB8] {
        &self.pixels
    }

    fn scale(&self, color: RGB8) -> RGB8 {
        let channel = |c: u8| (c as f32 * self.brightness).round().clamp(0.0, 255.0) as u8;
        RGB8 {
            r: channel(color.r),
            g: channel(color.g),
            b: channel(color.b),
        }
    }
}
