//! LED strip rendering.
//!
//! Both renderers keep a frame in memory; the hardware one also pushes it to
//! a [`StripDriver`] on flush. Which one is used is decided once, by
//! [`build_renderer`].

mod frame;
mod hardware;
mod simulation;

use smart_leds::RGB8;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::LedConfig;

pub use frame::{BLACK, LedFrame};
pub use hardware::{
    DriverError, HardwareRenderer, SPI_CLOCK_HZ, SpiStripDriver, StripDriver, encode_ws2812,
};
pub use simulation::SimulationRenderer;

/// The SPI driver writes on MOSI, which is GPIO 10 on a Raspberry Pi.
const SPI_MOSI_PIN: u8 = 10;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("LED index {index} out of range for a strip of {led_count}")]
    IndexOutOfRange { index: usize, led_count: usize },
    #[error("LED hardware fault: {0}")]
    HardwareFault(String),
}

pub trait LedRenderer: Send {
    fn led_count(&self) -> usize;

    /// Sets one logical LED. Out of range indices leave the frame untouched.
    fn set(&mut self, index: usize, color: RGB8) -> Result<(), RenderError>;

    /// Applies every update even when some fail, so a partial application is
    /// possible. Returns the first error.
    fn set_many(&mut self, updates: &[(usize, RGB8)]) -> Result<(), RenderError> {
        let mut first_error = None;
        for &(index, color) in updates {
            if let Err(e) = self.set(index, color) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Turns every LED off and flushes.
    fn clear_all(&mut self) -> Result<(), RenderError>;

    fn flush(&mut self) -> Result<(), RenderError>;

    /// Copy of the current frame in wire order.
    fn snapshot(&self) -> Vec<RGB8>;
}

/// Picks the hardware renderer when the strip is enabled and its device opens,
/// the simulation renderer otherwise.
pub fn build_renderer(config: &LedConfig) -> Box<dyn LedRenderer> {
    if !config.enabled {
        info!("LED hardware disabled, using simulation ({} LEDs)", config.led_count);
        return Box::new(SimulationRenderer::new(config));
    }

    if config.gpio_pin != SPI_MOSI_PIN {
        warn!(
            "gpio_pin {} configured but the SPI driver outputs on GPIO {}",
            config.gpio_pin, SPI_MOSI_PIN
        );
    }

    match SpiStripDriver::open(&config.device) {
        Ok(driver) => {
            info!(
                "Driving {} LEDs through {}",
                config.led_count,
                config.device.display()
            );
            Box::new(HardwareRenderer::new(config, Box::new(driver)))
        }
        Err(e) => {
            warn!("LED hardware unavailable ({}), falling back to simulation", e);
            Box::new(SimulationRenderer::new(config))
        }
    }
}
