//! STEP/DIR pulse drive (DRV8825, Waveshare Stepper HAT (B))
//!
//! The driver IC does the coil sequencing; the host only sets direction,
//! enables the output stage and clocks STEP. ENABLE is active low.
//!
//! Per move:
//!
//! ```text
//! DIR ──► ENABLE low ──► settle ──► (STEP high, delay, STEP low, delay) × n ──► ENABLE high
//! ```
//!
//! A move of `n` steps therefore blocks for `settle + n × 2 × delay`.
//! The settle time covers the DRV8825 wake-up after ENABLE and must be at
//! least 1 ms.
//!
//! A MODE change that fails partway is rolled back to the previous levels.
//! If the rollback fails too, the MODE lines are in an unknown state and the
//! next move writes the recorded mode again before it enables the driver.

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};
use stepfocus_core::config::{PulseConfig, PulsePins};
use stepfocus_core::motion::MicrostepMode;
use stepfocus_core::traits::{Direction, EngineError};
use stepfocus_hal::{ClaimedLines, GpioBackend, GpioController, GpioError};

use super::engine::{Drive, Engine};

/// STEP/DIR/ENABLE sequencer
#[derive(Debug, Clone)]
pub struct PulseDrive {
    pins: PulsePins,
    microstep: MicrostepMode,
    settle_us: u32,
    // MODE lines may not match `microstep`
    mode_stale: bool,
}

impl PulseDrive {
    fn dir_level(&self, direction: Direction) -> bool {
        (direction == Direction::Forward) != self.pins.invert_dir
    }

    /// Drive the MODE lines for `mode`
    ///
    /// Every line is attempted; the first failure is returned.
    fn write_mode<C: GpioController>(
        &self,
        lines: &mut ClaimedLines<C>,
        mode: MicrostepMode,
    ) -> Result<(), GpioError> {
        let mut result = Ok(());
        if let Some(mode_lines) = self.pins.mode {
            for (line, level) in mode_lines.into_iter().zip(mode.mode_levels()) {
                if let Err(e) = lines.write(line, level) {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }
}

impl Drive for PulseDrive {
    const NAME: &'static str = "pulse";

    fn begin<C: GpioController, T: DelayNs>(
        &mut self,
        lines: &mut ClaimedLines<C>,
        delay: &mut T,
        direction: Direction,
    ) -> Result<(), GpioError> {
        if self.mode_stale {
            self.write_mode(lines, self.microstep)?;
            self.mode_stale = false;
            info!("pulse microstep mode 1/{} re-applied", self.microstep.divisor());
        }
        lines.write(self.pins.dir, self.dir_level(direction))?;
        lines.write(self.pins.enable, false)?;
        delay.delay_us(self.settle_us);
        Ok(())
    }

    fn step<C: GpioController, T: DelayNs>(
        &mut self,
        lines: &mut ClaimedLines<C>,
        delay: &mut T,
        _direction: Direction,
        step_delay_us: u32,
    ) -> Result<(), GpioError> {
        lines.write(self.pins.step, true)?;
        delay.delay_us(step_delay_us);
        lines.write(self.pins.step, false)?;
        delay.delay_us(step_delay_us);
        Ok(())
    }

    fn finish<C: GpioController>(&mut self, lines: &mut ClaimedLines<C>) -> Result<(), GpioError> {
        lines.write(self.pins.enable, true)
    }

    fn shutdown<C: GpioController>(
        &mut self,
        lines: &mut ClaimedLines<C>,
    ) -> Result<(), GpioError> {
        // Disabling matters most; try it even if STEP is stuck
        let disabled = lines.write(self.pins.enable, true);
        let step_low = lines.write(self.pins.step, false);
        disabled.and(step_low)
    }
}

/// Engine clocking an external STEP/DIR driver IC
pub type PulseEngine<C, T> = Engine<PulseDrive, C, T>;

impl<C: GpioController, T: DelayNs> Engine<PulseDrive, C, T> {
    /// Open the controller and claim ENABLE (high), DIR, STEP and MODE lines
    ///
    /// MODE lines are set to `config.microstep` before returning. On any
    /// failure the lines claimed so far are released and the controller
    /// closed.
    pub fn new<B>(
        backend: &B,
        config: PulseConfig,
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

        let pins = config.pins;
        let mut lines = ClaimedLines::new(backend.open(pins.chip)?);
        // ENABLE first so the output stage stays off while the rest is set up
        lines.claim(pins.enable, true)?;
        lines.claim(pins.dir, false)?;
        lines.claim(pins.step, false)?;
        if let Some(mode_lines) = pins.mode {
            for line in mode_lines {
                lines.claim(line, false)?;
            }
        }

        let drive = PulseDrive {
            pins,
            microstep: config.microstep,
            settle_us: config.settle_us,
            mode_stale: false,
        };
        drive.write_mode(&mut lines, config.microstep)?;

        info!(
            "pulse engine on chip {} (dir {}, step {}, enable {}), 1/{} step, {} us/step",
            pins.chip,
            pins.dir,
            pins.step,
            pins.enable,
            config.microstep.divisor(),
            step_delay_us
        );
        Ok(Self::from_parts(drive, lines, step_delay_us, delay))
    }

    /// Microstep mode currently set on the MODE lines
    pub fn microstep_mode(&self) -> MicrostepMode {
        self.lock().drive.microstep
    }

    /// Drive the MODE lines to a new resolution
    ///
    /// Waits for a move in flight to finish. Position is kept in steps of
    /// whatever mode was active when they were taken.
    ///
    /// On a failed write the previous mode is restored and stays the
    /// reported one.
    pub fn set_microstep_mode(&self, mode: MicrostepMode) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.drive.pins.mode.is_none() {
            return Err(EngineError::InvalidConfig("no MODE lines assigned"));
        }

        let state = &mut *state;
        let previous = state.drive.microstep;
        if let Err(e) = state.drive.write_mode(&mut state.lines, mode) {
            match state.drive.write_mode(&mut state.lines, previous) {
                Ok(()) => warn!(
                    "pulse microstep 1/{} failed ({}), restored 1/{}",
                    mode.divisor(),
                    e,
                    previous.divisor()
                ),
                Err(restore) => {
                    state.drive.mode_stale = true;
                    error!(
                        "pulse microstep 1/{} failed ({}), restoring 1/{} failed ({})",
                        mode.divisor(),
                        e,
                        previous.divisor(),
                        restore
                    );
                }
            }
            return Err(e.into());
        }
        state.drive.microstep = mode;
        state.drive.mode_stale = false;
        debug!("pulse microstep mode 1/{}", mode.divisor());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepfocus_core::traits::StepperEngine;
    use stepfocus_hal::mock::{GpioEvent, RecordingBackend, RecordingController, RecordingDelay};

    fn engine_with(
        backend: &RecordingBackend,
        config: PulseConfig,
        delay: &RecordingDelay,
    ) -> PulseEngine<RecordingController, RecordingDelay> {
        PulseEngine::new(backend, config, 800, delay.clone()).unwrap()
    }

    fn without_mode_lines() -> PulseConfig {
        PulseConfig {
            pins: PulsePins {
                mode: None,
                ..PulsePins::default()
            },
            ..PulseConfig::default()
        }
    }

    #[test]
    fn test_construction_keeps_driver_disabled() {
        let backend = RecordingBackend::new();
        let pins = PulsePins::default();
        let _engine = engine_with(&backend, PulseConfig::default(), &RecordingDelay::new());

        let events = backend.events();
        assert_eq!(events[0], GpioEvent::Open { chip: 0 });
        assert_eq!(
            events[1],
            GpioEvent::Claim {
                line: pins.enable,
                level: true
            }
        );
        assert_eq!(backend.level(pins.enable), Some(true));
        assert_eq!(backend.claimed_count(), 6);
    }

    #[test]
    fn test_forward_move_sequence_and_timing() {
        let backend = RecordingBackend::new();
        let delay = RecordingDelay::new();
        let pins = PulsePins::default();
        let engine = engine_with(&backend, PulseConfig::default(), &delay);
        backend.clear_events();

        let report = engine.move_steps(3).unwrap();
        assert!(report.is_complete());

        let mut expected = vec![(pins.dir, true), (pins.enable, false)];
        for _ in 0..3 {
            expected.push((pins.step, true));
            expected.push((pins.step, false));
        }
        expected.push((pins.enable, true));
        assert_eq!(backend.writes(), expected);
        assert_eq!(delay.total_us(), 1_000 + 3 * 2 * 800);
        assert_eq!(engine.position(), 3);
    }

    #[test]
    fn test_reverse_and_inverted_direction() {
        let backend = RecordingBackend::new();
        let pins = PulsePins::default();
        let engine = engine_with(&backend, PulseConfig::default(), &RecordingDelay::new());

        engine.move_steps(-2).unwrap();
        assert_eq!(backend.level(pins.dir), Some(false));
        assert_eq!(engine.position(), -2);
        drop(engine);

        let config = PulseConfig {
            pins: PulsePins {
                invert_dir: true,
                ..pins
            },
            ..PulseConfig::default()
        };
        let engine = engine_with(&backend, config, &RecordingDelay::new());
        engine.move_steps(-2).unwrap();
        assert_eq!(backend.level(pins.dir), Some(true));
        engine.move_steps(2).unwrap();
        assert_eq!(backend.level(pins.dir), Some(false));
        assert_eq!(engine.position(), 0);
    }

    #[test]
    fn test_disabled_between_moves() {
        let backend = RecordingBackend::new();
        let pins = PulsePins::default();
        let engine = engine_with(&backend, PulseConfig::default(), &RecordingDelay::new());

        engine.move_steps(4).unwrap();
        assert_eq!(backend.level(pins.enable), Some(true));
        assert_eq!(backend.level(pins.step), Some(false));
    }

    #[test]
    fn test_longer_settle() {
        let backend = RecordingBackend::new();
        let delay = RecordingDelay::new();
        let config = PulseConfig {
            settle_us: 2_500,
            ..PulseConfig::default()
        };
        let engine = engine_with(&backend, config, &delay);

        engine.move_steps(1).unwrap();
        assert_eq!(delay.total_us(), 2_500 + 2 * 800);
    }

    #[test]
    fn test_microstep_lines_set_at_construction() {
        let backend = RecordingBackend::new();
        let config = PulseConfig {
            microstep: MicrostepMode::Eighth,
            ..PulseConfig::default()
        };
        let engine = engine_with(&backend, config, &RecordingDelay::new());

        let [m0, m1, m2] = [21, 22, 27];
        assert_eq!(backend.level(m0), Some(true));
        assert_eq!(backend.level(m1), Some(true));
        assert_eq!(backend.level(m2), Some(false));
        assert_eq!(engine.microstep_mode(), MicrostepMode::Eighth);
    }

    #[test]
    fn test_set_microstep_mode() {
        let backend = RecordingBackend::new();
        let engine = engine_with(&backend, PulseConfig::default(), &RecordingDelay::new());
        backend.clear_events();

        engine.set_microstep_mode(MicrostepMode::ThirtySecond).unwrap();
        assert_eq!(backend.writes(), vec![(21, true), (22, false), (27, true)]);
        assert_eq!(engine.microstep_mode(), MicrostepMode::ThirtySecond);
    }

    #[test]
    fn test_failed_microstep_change_restores_previous_mode() {
        let backend = RecordingBackend::new();
        let engine = engine_with(&backend, PulseConfig::default(), &RecordingDelay::new());
        // MODE1 fails after MODE0 was already raised
        backend.fail_writes_after(1);

        assert_eq!(
            engine.set_microstep_mode(MicrostepMode::ThirtySecond),
            Err(EngineError::WriteFailure { line: 22 })
        );
        backend.heal_writes();
        assert_eq!(engine.microstep_mode(), MicrostepMode::Full);
        assert_eq!(backend.level(21), Some(true));

        // Rollback failed as well, so the next move re-applies full step
        backend.clear_events();
        engine.move_steps(1).unwrap();
        let writes = backend.writes();
        assert_eq!(writes[..3], [(21, false), (22, false), (27, false)]);
        assert_eq!(backend.level(21), Some(false));

        // Only once
        backend.clear_events();
        engine.move_steps(1).unwrap();
        let mode_lines = [21, 22, 27];
        assert!(!backend
            .writes()
            .iter()
            .any(|(line, _)| mode_lines.contains(line)));
    }

    #[test]
    fn test_broken_mode_line_blocks_moves_until_reapplied() {
        let backend = RecordingBackend::new();
        let pins = PulsePins::default();
        let engine = engine_with(&backend, PulseConfig::default(), &RecordingDelay::new());
        backend.fail_writes_to(22);

        assert_eq!(
            engine.set_microstep_mode(MicrostepMode::ThirtySecond),
            Err(EngineError::WriteFailure { line: 22 })
        );
        assert_eq!(backend.level(21), Some(false));
        assert_eq!(backend.level(22), Some(false));
        assert_eq!(backend.level(27), Some(false));
        assert_eq!(engine.microstep_mode(), MicrostepMode::Full);

        // The driver is never enabled at an unconfirmed resolution
        backend.clear_events();
        assert_eq!(
            engine.move_steps(3),
            Err(EngineError::WriteFailure { line: 22 })
        );
        assert!(!backend.writes().contains(&(pins.enable, false)));
        assert_eq!(engine.position(), 0);

        backend.heal_writes();
        assert!(engine.move_steps(3).unwrap().is_complete());
        assert_eq!(engine.position(), 3);
    }

    #[test]
    fn test_set_microstep_mode_without_lines() {
        let backend = RecordingBackend::new();
        let engine = engine_with(&backend, without_mode_lines(), &RecordingDelay::new());

        assert_eq!(backend.claimed_count(), 3);
        assert_eq!(
            engine.set_microstep_mode(MicrostepMode::Half),
            Err(EngineError::InvalidConfig("no MODE lines assigned"))
        );
        assert_eq!(engine.microstep_mode(), MicrostepMode::Full);
    }

    #[test]
    fn test_microstep_requires_mode_lines() {
        let backend = RecordingBackend::new();
        let config = PulseConfig {
            microstep: MicrostepMode::Quarter,
            ..without_mode_lines()
        };
        let result = PulseEngine::new(&backend, config, 800, RecordingDelay::new());
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
        assert!(backend.events().is_empty());
    }

    #[test]
    fn test_short_settle_rejected() {
        let backend = RecordingBackend::new();
        let config = PulseConfig {
            settle_us: 999,
            ..PulseConfig::default()
        };
        let result = PulseEngine::new(&backend, config, 800, RecordingDelay::new());
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_step_failure_disables_driver() {
        let backend = RecordingBackend::new();
        let pins = PulsePins::default();
        let engine = engine_with(&backend, PulseConfig::default(), &RecordingDelay::new());
        backend.fail_writes_to(pins.step);

        let result = engine.move_steps(10);
        assert_eq!(result, Err(EngineError::WriteFailure { line: pins.step }));
        assert_eq!(engine.position(), 0);
        assert_eq!(engine.last_direction(), None);
        assert_eq!(backend.level(pins.enable), Some(true));
    }

    #[test]
    fn test_mode_line_busy_rolls_back() {
        let backend = RecordingBackend::new();
        backend.mark_busy(27);

        let result = PulseEngine::new(
            &backend,
            PulseConfig::default(),
            800,
            RecordingDelay::new(),
        );
        assert!(matches!(
            result,
            Err(EngineError::LineUnavailable { line: 27 })
        ));
        assert_eq!(backend.claimed_count(), 0);
        assert!(!backend.is_open());
        // The driver was never enabled on the way out
        assert_eq!(backend.level(PulsePins::default().enable), Some(true));
    }

    #[test]
    fn test_drop_disables_and_releases() {
        let backend = RecordingBackend::new();
        let pins = PulsePins::default();
        let engine = engine_with(&backend, PulseConfig::default(), &RecordingDelay::new());
        engine.move_steps(5).unwrap();

        drop(engine);
        assert_eq!(backend.level(pins.enable), Some(true));
        assert_eq!(backend.level(pins.step), Some(false));
        assert_eq!(backend.level(pins.dir), Some(false));
        assert_eq!(backend.claimed_count(), 0);
        assert!(!backend.is_open());
    }
}
