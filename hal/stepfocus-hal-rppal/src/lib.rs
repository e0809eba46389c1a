//! Raspberry Pi GPIO backend
//!
//! Implements the stepfocus-hal traits on top of `rppal`, which maps the
//! BCM283x / BCM2711 GPIO bank through `/dev/gpiomem`. Line numbers are BCM
//! GPIO numbers and the SoC bank is the only controller (chip 0).
//!
//! Released pins stay outputs at their last level. Restoring the previous
//! mode would turn them into floating inputs, and a DRV8825 nENBL pin pulled
//! down internally would re-enable the driver after teardown.

#![deny(unsafe_code)]

use log::{debug, warn};
use rppal::gpio::{Gpio, OutputPin};
use stepfocus_hal::{GpioBackend, GpioController, GpioError};

/// Highest BCM GPIO number
pub const MAX_BCM_LINE: u32 = 53;

/// Backend for the Raspberry Pi SoC GPIO bank
#[derive(Debug, Clone, Copy, Default)]
pub struct RppalBackend;

impl RppalBackend {
    /// Backend for the SoC bank; nothing is mapped until [`GpioBackend::open`]
    pub const fn new() -> Self {
        Self
    }
}

impl GpioBackend for RppalBackend {
    type Controller = RppalController;

    fn open(&self, chip: u32) -> Result<Self::Controller, GpioError> {
        if chip != 0 {
            return Err(GpioError::ControllerUnavailable { chip });
        }
        let gpio = Gpio::new().map_err(|e| {
            warn!("GPIO controller unavailable: {}", e);
            GpioError::ControllerUnavailable { chip }
        })?;
        Ok(RppalController {
            gpio,
            pins: Vec::new(),
        })
    }
}

/// Open handle on the SoC GPIO bank
pub struct RppalController {
    gpio: Gpio,
    pins: Vec<(u32, OutputPin)>,
}

impl RppalController {
    fn pin_mut(&mut self, line: u32) -> Option<&mut OutputPin> {
        self.pins
            .iter_mut()
            .find(|(claimed, _)| *claimed == line)
            .map(|(_, pin)| pin)
    }
}

impl GpioController for RppalController {
    fn claim_output(&mut self, line: u32, initial: bool) -> Result<(), GpioError> {
        if self.pins.iter().any(|(claimed, _)| *claimed == line) {
            return Err(GpioError::LineUnavailable { line });
        }
        let bcm = u8::try_from(line)
            .ok()
            .filter(|&bcm| u32::from(bcm) <= MAX_BCM_LINE)
            .ok_or(GpioError::LineUnavailable { line })?;
        let pin = self.gpio.get(bcm).map_err(|e| {
            warn!("BCM {} unavailable: {}", line, e);
            GpioError::LineUnavailable { line }
        })?;

        let mut output = if initial {
            pin.into_output_high()
        } else {
            pin.into_output_low()
        };
        // Keep driving the safe level written just before release
        output.set_reset_on_drop(false);
        self.pins.push((line, output));
        debug!("claimed BCM {} as output, initially {}", line, initial);
        Ok(())
    }

    fn write(&mut self, line: u32, level: bool) -> Result<(), GpioError> {
        let pin = self
            .pin_mut(line)
            .ok_or(GpioError::WriteFailed { line })?;
        if level {
            pin.set_high();
        } else {
            pin.set_low();
        }
        Ok(())
    }

    fn release(&mut self, line: u32) {
        // The pin stays an output at its last level after the drop
        self.pins.retain(|(claimed, _)| *claimed != line);
    }

    fn close(&mut self) {
        self.pins.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_chip_zero_exists() {
        let result = RppalBackend::new().open(1);
        assert!(matches!(
            result,
            Err(GpioError::ControllerUnavailable { chip: 1 })
        ));
    }

    #[test]
    #[ignore = "needs a Raspberry Pi"]
    fn test_released_line_keeps_safe_level() {
        use rppal::gpio::{Level, Mode};

        let mut controller = RppalBackend::new().open(0).unwrap();
        controller.claim_output(4, false).unwrap();
        controller.write(4, true).unwrap();
        controller.release(4);
        controller.close();

        let pin = Gpio::new().unwrap().get(4).unwrap();
        assert_eq!(pin.mode(), Mode::Output);
        assert_eq!(pin.read(), Level::High);
    }
}
