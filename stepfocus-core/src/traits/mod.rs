//! Engine abstraction traits
//!
//! These traits define the interface between the surrounding device layer
//! (a focuser driver, a test harness) and the concrete drive engines.

pub mod stepper;

pub use stepper::{Direction, EngineError, MoveReport, StepperEngine};
