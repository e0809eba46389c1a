//! Motion bookkeeping shared by both drive variants

pub mod backlash;
pub mod microstep;
pub mod phase;

pub use backlash::BacklashState;
pub use microstep::MicrostepMode;
pub use phase::{CoilPattern, PhaseSequence, PhaseTable, FULL_STEP, HALF_STEP, WAVE};
