//! DRV8825 microstep selection
//!
//! The driver IC samples its three MODE inputs to pick a step resolution.
//! Truth table (MODE0, MODE1, MODE2):
//!
//! | mode | M0 | M1 | M2 |
//! |------|----|----|----|
//! | full | 0  | 0  | 0  |
//! | 1/2  | 1  | 0  | 0  |
//! | 1/4  | 0  | 1  | 0  |
//! | 1/8  | 1  | 1  | 0  |
//! | 1/16 | 0  | 0  | 1  |
//! | 1/32 | 1  | 0  | 1  |

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Step resolution of an external driver IC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MicrostepMode {
    /// Full step
    #[default]
    Full,
    /// 1/2 step
    Half,
    /// 1/4 step
    Quarter,
    /// 1/8 step
    Eighth,
    /// 1/16 step
    Sixteenth,
    /// 1/32 step
    ThirtySecond,
}

impl MicrostepMode {
    /// Levels for the MODE0, MODE1, MODE2 lines
    pub fn mode_levels(self) -> [bool; 3] {
        match self {
            MicrostepMode::Full => [false, false, false],
            MicrostepMode::Half => [true, false, false],
            MicrostepMode::Quarter => [false, true, false],
            MicrostepMode::Eighth => [true, true, false],
            MicrostepMode::Sixteenth => [false, false, true],
            MicrostepMode::ThirtySecond => [true, false, true],
        }
    }

    /// Microsteps per full step
    pub fn divisor(self) -> u16 {
        match self {
            MicrostepMode::Full => 1,
            MicrostepMode::Half => 2,
            MicrostepMode::Quarter => 4,
            MicrostepMode::Eighth => 8,
            MicrostepMode::Sixteenth => 16,
            MicrostepMode::ThirtySecond => 32,
        }
    }
}
