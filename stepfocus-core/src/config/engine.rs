//! Engine configuration
//!
//! One [`EngineConfig`] describes a complete engine: shared timing and
//! backlash settings plus the drive variant with its pins. The variant
//! decides which engine is built.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::pins::{CoilPins, PulsePins};
use crate::motion::{MicrostepMode, PhaseSequence};
use crate::traits::EngineError;

/// Default step delay for coil-phase drive (28BYJ-48 on ULN2003)
pub const DEFAULT_COIL_STEP_DELAY_US: u32 = 2_000;

/// Default step delay for STEP/DIR drive (each half of the pulse period)
pub const DEFAULT_PULSE_STEP_DELAY_US: u32 = 800;

/// Minimum settle time after asserting ENABLE/DIR on a driver IC
pub const MIN_PULSE_SETTLE_US: u32 = 1_000;

/// Coil-phase drive settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CoilPhaseConfig {
    /// Coil lines
    pub pins: CoilPins,
    /// Energization table
    pub sequence: PhaseSequence,
    /// Keep the last pattern energized after a move (holding torque).
    /// When false the coils are switched off to limit heating.
    pub hold_after_move: bool,
    /// Energize the current pattern and wait this long before the first
    /// step (0 = no pre-energize)
    pub settle_us: u32,
}

impl Default for CoilPhaseConfig {
    fn default() -> Self {
        Self {
            pins: CoilPins::default(),
            sequence: PhaseSequence::default(),
            hold_after_move: true,
            settle_us: 0,
        }
    }
}

impl CoilPhaseConfig {
    /// Check pin assignment
    pub fn validate(&self) -> Result<(), EngineError> {
        self.pins.validate()
    }
}

/// STEP/DIR drive settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PulseConfig {
    /// Driver IC lines
    pub pins: PulsePins,
    /// Step resolution written to the MODE lines
    pub microstep: MicrostepMode,
    /// Wait after enable/direction changes before the first pulse
    pub settle_us: u32,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            pins: PulsePins::default(),
            microstep: MicrostepMode::default(),
            settle_us: MIN_PULSE_SETTLE_US,
        }
    }
}

impl PulseConfig {
    /// Check pin assignment and settle time
    pub fn validate(&self) -> Result<(), EngineError> {
        self.pins.validate()?;
        if self.settle_us < MIN_PULSE_SETTLE_US {
            return Err(EngineError::InvalidConfig(
                "pulse settle time must be at least 1000 us",
            ));
        }
        if self.microstep != MicrostepMode::Full && self.pins.mode.is_none() {
            return Err(EngineError::InvalidConfig(
                "microstep mode requires MODE lines",
            ));
        }
        Ok(())
    }
}

/// Drive variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum DriveConfig {
    /// Four coil lines driven from a phase table
    CoilPhase(CoilPhaseConfig),
    /// External driver IC via STEP/DIR/ENABLE
    Pulse(PulseConfig),
}

impl Default for DriveConfig {
    fn default() -> Self {
        DriveConfig::Pulse(PulseConfig::default())
    }
}

impl DriveConfig {
    /// Step delay that suits this variant
    pub fn default_step_delay_us(&self) -> u32 {
        match self {
            DriveConfig::CoilPhase(_) => DEFAULT_COIL_STEP_DELAY_US,
            DriveConfig::Pulse(_) => DEFAULT_PULSE_STEP_DELAY_US,
        }
    }

    /// Validate the variant settings
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            DriveConfig::CoilPhase(config) => config.validate(),
            DriveConfig::Pulse(config) => config.validate(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Delay between pin transitions in microseconds
    pub step_delay_us: u32,
    /// Backlash take-up distance in steps (0 = off)
    pub backlash_steps: u32,
    /// Upper end of absolute travel; absolute moves stay within `0..=max`
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max_position: Option<u32>,
    /// Drive variant and its pins
    pub drive: DriveConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DriveConfig::default())
    }
}

impl EngineConfig {
    /// Configuration for `drive` with its default step delay, no backlash
    /// and unlimited travel
    pub fn new(drive: DriveConfig) -> Self {
        Self {
            step_delay_us: drive.default_step_delay_us(),
            backlash_steps: 0,
            max_position: None,
            drive,
        }
    }

    /// Check every field
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.step_delay_us == 0 {
            return Err(EngineError::InvalidStepDelay);
        }
        self.drive.validate()
    }
}
