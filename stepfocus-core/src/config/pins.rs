//! Pin assignments
//!
//! Logical roles mapped to GPIO line numbers on one controller. An
//! assignment is handed to an engine at construction and never changes
//! afterwards.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::traits::EngineError;

/// Lines driven by a coil-phase engine
///
/// Phase table column `i` drives the `i`-th line of [`CoilPins::lines`].
/// For ULN2003 boards wire IN1..IN4 in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CoilPins {
    /// GPIO controller (`/dev/gpiochipN`)
    pub chip: u32,
    /// First coil line
    pub coil_a1: u32,
    /// Second coil line
    pub coil_a2: u32,
    /// Third coil line
    pub coil_b1: u32,
    /// Fourth coil line
    pub coil_b2: u32,
}

impl Default for CoilPins {
    fn default() -> Self {
        // Waveshare Stepper Motor HAT, motor 1
        Self {
            chip: 0,
            coil_a1: 12,
            coil_a2: 13,
            coil_b1: 19,
            coil_b2: 16,
        }
    }
}

impl CoilPins {
    /// Coil lines in phase-table column order
    pub fn lines(&self) -> [u32; 4] {
        [self.coil_a1, self.coil_a2, self.coil_b1, self.coil_b2]
    }

    /// Reject assignments that use a line twice
    pub fn validate(&self) -> Result<(), EngineError> {
        ensure_distinct(&self.lines())
    }
}

/// Lines driven by a STEP/DIR pulse engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PulsePins {
    /// GPIO controller (`/dev/gpiochipN`)
    pub chip: u32,
    /// Direction line
    pub dir: u32,
    /// Step pulse line (rising edge advances the driver)
    pub step: u32,
    /// Enable line (active low)
    pub enable: u32,
    /// MODE0..MODE2 microstep selection lines, if wired
    pub mode: Option<[u32; 3]>,
    /// Swap the DIR level for positive steps
    pub invert_dir: bool,
}

impl Default for PulsePins {
    fn default() -> Self {
        // Waveshare Stepper HAT (B), BCM numbering
        Self {
            chip: 0,
            dir: 24,
            step: 18,
            enable: 4,
            mode: Some([21, 22, 27]),
            invert_dir: false,
        }
    }
}

impl PulsePins {
    /// Every line this assignment claims
    pub fn lines(&self) -> Vec<u32, 6> {
        let mut lines = Vec::new();
        let _ = lines.push(self.dir);
        let _ = lines.push(self.step);
        let _ = lines.push(self.enable);
        if let Some(mode) = self.mode {
            for line in mode {
                let _ = lines.push(line);
            }
        }
        lines
    }

    /// Reject assignments that use a line twice
    pub fn validate(&self) -> Result<(), EngineError> {
        ensure_distinct(&self.lines())
    }
}

fn ensure_distinct(lines: &[u32]) -> Result<(), EngineError> {
    for (i, line) in lines.iter().enumerate() {
        if lines[i + 1..].contains(line) {
            return Err(EngineError::InvalidConfig("GPIO line assigned twice"));
        }
    }
    Ok(())
}
