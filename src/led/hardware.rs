use std::fs::{File, OpenOptions};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use smart_leds::RGB8;
use tracing::debug;

use super::{LedFrame, LedRenderer, RenderError};
use crate::config::LedConfig;

pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// Pushes a full frame to a physical strip.
///
/// Implement this trait to support different hardware. Colors arrive in wire
/// order with brightness already applied.
pub trait StripDriver: Send {
    fn write(&mut self, pixels: &[RGB8]) -> Result<(), DriverError>;
}

/// Buffers colors in a frame and hands it to a [`StripDriver`] on flush.
///
/// Driver errors and driver panics both surface as
/// [`RenderError::HardwareFault`].
pub struct HardwareRenderer {
    frame: LedFrame,
    driver: Box<dyn StripDriver>,
}

impl HardwareRenderer {
    pub fn new(config: &LedConfig, driver: Box<dyn StripDriver>) -> Self {
        Self {
            frame: LedFrame::new(
                config.led_count as usize,
                config.orientation,
                config.brightness,
            ),
            driver,
        }
    }
}

impl LedRenderer for HardwareRenderer {
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
        let pixels = self.frame.pixels();
        let driver = &mut self.driver;
        match panic::catch_unwind(AssertUnwindSafe(|| driver.write(pixels))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RenderError::HardwareFault(e.to_string())),
            Err(payload) => Err(RenderError::HardwareFault(panic_message(payload.as_ref()))),
        }
    }

    fn snapshot(&self) -> Vec<RGB8> {
        self.frame.pixels().to_vec()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("driver panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("driver panicked: {msg}")
    } else {
        "driver panicked".to_string()
    }
}

/// SPI clock the WS2812 encoding assumes: three SPI bits per data bit.
pub const SPI_CLOCK_HZ: u32 = 2_400_000;

/// Zero bytes appended after each frame to hold the line low for the latch.
const LATCH_BYTES: usize = 40;

/// Drives a WS2812 strip through a spidev node, with the data line on MOSI.
///
/// The bus must already be clocked at [`SPI_CLOCK_HZ`].
pub struct SpiStripDriver {
    device: File,
    path: PathBuf,
    buffer: Vec<u8>,
}

impl SpiStripDriver {
    pub fn open(path: &Path) -> Result<Self, DriverError> {
        let device = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| format!("failed to open {}: {}", path.display(), e))?;
        debug!("Opened LED strip device {}", path.display());

        Ok(Self {
            device,
            path: path.to_path_buf(),
            buffer: Vec::new(),
        })
    }
}

impl StripDriver for SpiStripDriver {
    fn write(&mut self, pixels: &[RGB8]) -> Result<(), DriverError> {
        encode_ws2812(pixels, &mut self.buffer);
        self.device
            .write_all(&self.buffer)
            .and_then(|_| self.device.flush())
            .map_err(|e| format!("write to {} failed: {}", self.path.display(), e).into())
    }
}

/// Encodes pixels as GRB bit patterns for a WS2812 strip clocked from SPI:
/// a 1 bit becomes `110`, a 0 bit becomes `100`.
pub fn encode_ws2812(pixels: &[RGB8], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(pixels.len() * 9 + LATCH_BYTES);
    for pixel in pixels {
        for byte in [pixel.g, pixel.r, pixel.b] {
            out.extend_from_slice(&encode_byte(byte));
        }
    }
    out.resize(out.len() + LATCH_BYTES, 0);
}

fn encode_byte(byte: u8) -> [u8; 3] {
    let mut bits: u32 = 0;
    for i in (0..8).rev() {
        let pattern = if byte & (1 << i) != 0 { 0b110 } else { 0b100 };
        bits = (bits << 3) | pattern;
    }
    [(bits >> 16) as u8, (bits >> 8) as u8, bits as u8]
}
