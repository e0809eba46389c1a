//! Coil-phase drive (ULN2003 + 28BYJ-48)
//!
//! Four coil lines are switched directly from a [`PhaseTable`]. The phase
//! index survives across moves, so a reversal resumes from the exact pattern
//! the motor was left in and never skips a detent.
//!
//! Per step: advance the index, write the four coil levels, sleep one step
//! delay. The index is only committed once all four writes succeeded.
//!
//! # Energization
//!
//! - `settle_us > 0`: the current pattern is re-energized and held for that
//!   long before the first step, pulling the rotor onto its detent.
//! - `hold_after_move = false`: all coils are switched off after every move.
//!   The motor runs cooler but may slip under load.

use embedded_hal::delay::DelayNs;
use log::info;
use stepfocus_core::config::CoilPhaseConfig;
use stepfocus_core::motion::{CoilPattern, PhaseTable};
use stepfocus_core::traits::{Direction, EngineError};
use stepfocus_hal::{ClaimedLines, GpioBackend, GpioController, GpioError};

use super::engine::{Drive, Engine};

/// All four coils off
const DE_ENERGIZED: CoilPattern = [false; 4];

/// Phase table walker for four coil lines
#[derive(Debug, Clone)]
pub struct CoilPhaseDrive {
    coils: [u32; 4],
    table: PhaseTable,
    index: usize,
    hold_after_move: bool,
    settle_us: u32,
}

impl CoilPhaseDrive {
    fn energize<C: GpioController>(
        &self,
        lines: &mut ClaimedLines<C>,
        pattern: CoilPattern,
    ) -> Result<(), GpioError> {
        for (&line, level) in self.coils.iter().zip(pattern) {
            lines.write(line, level)?;
        }
        Ok(())
    }
}

impl Drive for CoilPhaseDrive {
    const NAME: &'static str = "coil-phase";

    fn begin<C: GpioController, T: DelayNs>(
        &mut self,
        lines: &mut ClaimedLines<C>,
        delay: &mut T,
        _direction: Direction,
    ) -> Result<(), GpioError> {
        if self.settle_us > 0 {
            self.energize(lines, self.table.pattern(self.index))?;
            delay.delay_us(self.settle_us);
        }
        Ok(())
    }

    fn step<C: GpioController, T: DelayNs>(
        &mut self,
        lines: &mut ClaimedLines<C>,
        delay: &mut T,
        direction: Direction,
        step_delay_us: u32,
    ) -> Result<(), GpioError> {
        let next = self.table.advance(self.index, direction);
        self.energize(lines, self.table.pattern(next))?;
        self.index = next;
        delay.delay_us(step_delay_us);
        Ok(())
    }

    fn finish<C: GpioController>(&mut self, lines: &mut ClaimedLines<C>) -> Result<(), GpioError> {
        if self.hold_after_move {
            return Ok(());
        }
        self.energize(lines, DE_ENERGIZED)
    }

    fn shutdown<C: GpioController>(
        &mut self,
        lines: &mut ClaimedLines<C>,
    ) -> Result<(), GpioError> {
        lines.safe_state()
    }
}

/// Engine driving four coil lines from a phase table
pub type CoilPhaseEngine<C, T> = Engine<CoilPhaseDrive, C, T>;

impl<C: GpioController, T: DelayNs> Engine<CoilPhaseDrive, C, T> {
    /// Open the controller and claim the four coil lines, all off
    ///
    /// The phase table comes from `config.sequence`. On any failure the lines
    /// claimed so far are released and the controller closed.
    pub fn new<B>(
        backend: &B,
        config: CoilPhaseConfig,
        step_delay_us: u32,
        delay: T,
    ) -> Result<Self, EngineError>
    where
        B: GpioBackend<Controller = C>,
    {
        let table = PhaseTable::from_sequence(config.sequence);
        Self::with_table(backend, config, table, step_delay_us, delay)
    }

    /// Like [`new`](Self::new) with a custom phase table
    ///
    /// `config.sequence` is ignored.
    pub fn with_table<B>(
        backend: &B,
        config: CoilPhaseConfig,
        table: PhaseTable,
        step_delay_us: u32,
        delay: T,
    ) -> Result<Self, EngineError>
    where
        B: GpioBackend<Controller = C>,
    {
        if step_delay_us == 0 {
            return Err(EngineError::InvalidStepDelay);
        }
        config.validate()?;

        let coils = config.pins.lines();
        let mut lines = ClaimedLines::new(backend.open(config.pins.chip)?);
        for line in coils {
            lines.claim(line, false)?;
        }

        info!(
            "coil-phase engine on chip {} lines {:?}, {}-phase table, {} us/step",
            config.pins.chip,
            coils,
            table.len(),
            step_delay_us
        );
        let drive = CoilPhaseDrive {
            coils,
            table,
            index: 0,
            hold_after_move: config.hold_after_move,
            settle_us: config.settle_us,
        };
        Ok(Self::from_parts(drive, lines, step_delay_us, delay))
    }

    /// Current position in the phase table
    pub fn phase_index(&self) -> usize {
        self.lock().drive.index
    }

    /// Pattern at the current phase index
    pub fn current_pattern(&self) -> CoilPattern {
        let state = self.lock();
        state.drive.table.pattern(state.drive.index)
    }

    /// Copy of the phase table in use
    pub fn phase_table(&self) -> PhaseTable {
        self.lock().drive.table.clone()
    }
}
