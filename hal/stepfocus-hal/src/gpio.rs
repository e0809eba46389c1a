//! GPIO line abstractions
//!
//! A backend hands out one controller handle per opened chip. Lines are
//! claimed as outputs on that handle before they can be written.

use core::fmt;

/// Errors reported by a GPIO backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioError {
    /// The controller could not be opened
    ControllerUnavailable {
        /// Controller (chip) identifier that was requested
        chip: u32,
    },
    /// The line does not exist or is already claimed
    LineUnavailable {
        /// Offending line number
        line: u32,
    },
    /// Writing a level to the line failed
    WriteFailed {
        /// Offending line number
        line: u32,
    },
    /// More lines claimed than a single owner can track
    TooManyLines,
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpioError::ControllerUnavailable { chip } => {
                write!(f, "GPIO controller {} unavailable", chip)
            }
            GpioError::LineUnavailable { line } => write!(f, "GPIO line {} unavailable", line),
            GpioError::WriteFailed { line } => write!(f, "write to GPIO line {} failed", line),
            GpioError::TooManyLines => write!(f, "too many GPIO lines claimed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for GpioError {}

/// Source of GPIO controllers
///
/// Implemented once per host GPIO library.
pub trait GpioBackend {
    /// Handle to an opened controller
    type Controller: GpioController;

    /// Open the controller identified by `chip`
    ///
    /// Fails with [`GpioError::ControllerUnavailable`] if the device cannot
    /// be opened.
    fn open(&self, chip: u32) -> Result<Self::Controller, GpioError>;
}

/// An opened GPIO controller
pub trait GpioController {
    /// Claim `line` as an output driven to `initial`
    ///
    /// Must be called once per line before any write. Claiming a line that
    /// is already claimed, or that does not exist, fails with
    /// [`GpioError::LineUnavailable`].
    fn claim_output(&mut self, line: u32, initial: bool) -> Result<(), GpioError>;

    /// Drive a claimed line to `level` (true = high)
    fn write(&mut self, line: u32, level: bool) -> Result<(), GpioError>;

    /// Release a claimed line
    ///
    /// Idempotent: releasing an unclaimed line is a no-op.
    fn release(&mut self, line: u32);

    /// Close the controller handle
    ///
    /// Idempotent. Lines still claimed are released by the backend.
    fn close(&mut self);
}
