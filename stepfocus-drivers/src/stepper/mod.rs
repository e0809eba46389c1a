//! Stepper engine implementations
//!
//! - [`CoilPhaseEngine`] - four coil lines switched from a phase table
//! - [`PulseEngine`] - STEP/DIR/ENABLE lines of an external driver IC
//! - [`Stepper`] - either of the above, chosen by [`EngineConfig`]

pub mod coil_phase;
pub mod engine;
pub mod pulse;

pub use coil_phase::{CoilPhaseDrive, CoilPhaseEngine};
pub use engine::{AbortHandle, Drive, Engine};
pub use pulse::{PulseDrive, PulseEngine};

use embedded_hal::delay::DelayNs;
use stepfocus_core::config::{DriveConfig, EngineConfig};
use stepfocus_core::traits::{Direction, EngineError, MoveReport, StepperEngine};
use stepfocus_hal::{GpioBackend, GpioController};

/// Engine variant selected at runtime from configuration
pub enum Stepper<C: GpioController, T: DelayNs> {
    /// Direct coil sequencing
    CoilPhase(CoilPhaseEngine<C, T>),
    /// External driver IC
    Pulse(PulseEngine<C, T>),
}

impl<C: GpioController, T: DelayNs> Stepper<C, T> {
    /// Validate `config` and build the engine it describes
    ///
    /// The configured backlash distance and travel limit are applied before
    /// returning.
    pub fn from_config<B>(config: &EngineConfig, backend: &B, delay: T) -> Result<Self, EngineError>
    where
        B: GpioBackend<Controller = C>,
    {
        config.validate()?;
        let stepper = match config.drive {
            DriveConfig::CoilPhase(coil) => Stepper::CoilPhase(CoilPhaseEngine::new(
                backend,
                coil,
                config.step_delay_us,
                delay,
            )?),
            DriveConfig::Pulse(pulse) => Stepper::Pulse(PulseEngine::new(
                backend,
                pulse,
                config.step_delay_us,
                delay,
            )?),
        };
        stepper.set_backlash_steps(config.backlash_steps);
        stepper.set_max_position(config.max_position);
        Ok(stepper)
    }

    /// Handle that aborts moves of this engine from another thread
    pub fn abort_handle(&self) -> AbortHandle {
        match self {
            Stepper::CoilPhase(engine) => engine.abort_handle(),
            Stepper::Pulse(engine) => engine.abort_handle(),
        }
    }

    /// True while a move is in flight
    pub fn is_moving(&self) -> bool {
        match self {
            Stepper::CoilPhase(engine) => engine.is_moving(),
            Stepper::Pulse(engine) => engine.is_moving(),
        }
    }
}

/// Forward a `StepperEngine` call to whichever variant is active
macro_rules! delegate {
    ($self:ident, $engine:ident => $call:expr) => {
        match $self {
            Stepper::CoilPhase($engine) => $call,
            Stepper::Pulse($engine) => $call,
        }
    };
}

impl<C: GpioController, T: DelayNs> StepperEngine for Stepper<C, T> {
    fn move_steps(&self, steps: i32) -> Result<MoveReport, EngineError> {
        delegate!(self, engine => engine.move_steps(steps))
    }

    fn move_with_backlash(&self, steps: i32) -> Result<MoveReport, EngineError> {
        delegate!(self, engine => engine.move_with_backlash(steps))
    }

    fn move_to(&self, target: i64) -> Result<MoveReport, EngineError> {
        delegate!(self, engine => engine.move_to(target))
    }

    fn set_step_delay_us(&self, delay_us: u32) -> Result<(), EngineError> {
        delegate!(self, engine => engine.set_step_delay_us(delay_us))
    }

    fn step_delay_us(&self) -> u32 {
        delegate!(self, engine => engine.step_delay_us())
    }

    fn set_backlash_steps(&self, steps: u32) {
        delegate!(self, engine => engine.set_backlash_steps(steps))
    }

    fn backlash_steps(&self) -> u32 {
        delegate!(self, engine => engine.backlash_steps())
    }

    fn last_direction(&self) -> Option<Direction> {
        delegate!(self, engine => engine.last_direction())
    }

    fn set_max_position(&self, max: Option<u32>) {
        delegate!(self, engine => engine.set_max_position(max))
    }

    fn max_position(&self) -> Option<u32> {
        delegate!(self, engine => engine.max_position())
    }

    fn position(&self) -> i64 {
        delegate!(self, engine => engine.position())
    }

    fn abort(&self) {
        delegate!(self, engine => engine.abort())
    }
}
