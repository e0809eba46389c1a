//! Stepper drive engine trait
//!
//! This trait abstracts over the two drive variants: direct coil-phase
//! sequencing and STEP/DIR pulsing of an external driver IC. The variant is
//! chosen once, at construction, from configuration.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use stepfocus_hal::GpioError;

/// Motor rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Direction {
    /// Positive step counts
    Forward,
    /// Negative step counts
    Reverse,
}

impl Direction {
    /// Direction of a signed step count, `None` for zero
    pub fn from_steps(steps: i32) -> Option<Self> {
        match steps {
            0 => None,
            s if s > 0 => Some(Direction::Forward),
            _ => Some(Direction::Reverse),
        }
    }

    /// `+1` or `-1`
    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }

    /// Get the opposite direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

/// Errors from engine construction and moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineError {
    /// The GPIO controller could not be opened
    DeviceUnavailable { chip: u32 },
    /// A required line could not be claimed
    LineUnavailable { line: u32 },
    /// A pin write failed mid-move
    WriteFailure { line: u32 },
    /// Step delay must be at least one microsecond
    InvalidStepDelay,
    /// Rejected configuration value
    InvalidConfig(&'static str),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::DeviceUnavailable { chip } => {
                write!(f, "GPIO controller {} unavailable", chip)
            }
            EngineError::LineUnavailable { line } => {
                write!(f, "GPIO line {} could not be claimed", line)
            }
            EngineError::WriteFailure { line } => write!(f, "write to GPIO line {} failed", line),
            EngineError::InvalidStepDelay => write!(f, "step delay must be positive"),
            EngineError::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<GpioError> for EngineError {
    fn from(e: GpioError) -> Self {
        match e {
            GpioError::ControllerUnavailable { chip } => EngineError::DeviceUnavailable { chip },
            GpioError::LineUnavailable { line } => EngineError::LineUnavailable { line },
            GpioError::WriteFailed { line } => EngineError::WriteFailure { line },
            GpioError::TooManyLines => EngineError::InvalidConfig("too many GPIO lines"),
        }
    }
}

/// Outcome of a move request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MoveReport {
    /// Signed step count the caller asked for
    pub requested: i32,
    /// Signed steps of the requested move that were physically executed
    pub executed: i32,
    /// Signed backlash take-up steps executed before the move
    pub take_up: i32,
    /// The move stopped early on an abort request
    pub aborted: bool,
}

impl MoveReport {
    /// Report for a request that needed no motion
    pub fn idle(requested: i32) -> Self {
        Self {
            requested,
            ..Default::default()
        }
    }

    /// True if every requested step was executed
    pub fn is_complete(&self) -> bool {
        !self.aborted && self.executed == self.requested
    }

    /// Net change of the cumulative position caused by this move
    pub fn position_delta(&self) -> i64 {
        i64::from(self.executed) + i64::from(self.take_up)
    }

    /// Physical steps performed, take-up included
    pub fn physical_steps(&self) -> u32 {
        self.executed.unsigned_abs() + self.take_up.unsigned_abs()
    }
}

/// Stepper drive engine
///
/// All methods take `&self`: an engine is shared between threads (behind an
/// `Arc`) and serializes moves internally. A move blocks the calling thread
/// for its whole duration; callers that need to stay responsive issue moves
/// from a worker thread.
pub trait StepperEngine {
    /// Execute a signed number of steps
    ///
    /// Zero is a no-op. Holds the engine lock for the whole move, so
    /// concurrent moves never interleave their pin writes.
    fn move_steps(&self, steps: i32) -> Result<MoveReport, EngineError>;

    /// Execute a move, taking up backlash first on a direction reversal
    fn move_with_backlash(&self, steps: i32) -> Result<MoveReport, EngineError>;

    /// Move to an absolute cumulative position
    ///
    /// The delta is computed under the engine lock. With a travel limit set,
    /// targets outside `0..=max` are rejected before any pin is touched.
    fn move_to(&self, target: i64) -> Result<MoveReport, EngineError>;

    /// Set the delay between pin transitions
    ///
    /// Takes effect from the next step of an in-flight move.
    fn set_step_delay_us(&self, delay_us: u32) -> Result<(), EngineError>;

    /// Current delay between pin transitions
    fn step_delay_us(&self) -> u32;

    /// Set the backlash take-up distance (0 disables compensation)
    fn set_backlash_steps(&self, steps: u32);

    /// Current backlash take-up distance
    fn backlash_steps(&self) -> u32;

    /// Direction of the last executed move, if any
    fn last_direction(&self) -> Option<Direction>;

    /// Limit absolute moves to `0..=max` (`None` removes the limit)
    ///
    /// Relative moves are not limited.
    fn set_max_position(&self, max: Option<u32>);

    /// Current absolute travel limit
    fn max_position(&self) -> Option<u32>;

    /// Net steps executed since construction
    fn position(&self) -> i64;

    /// Request that the move in flight stops after its current step
    fn abort(&self);
}
