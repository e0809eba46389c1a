//! Shared locked move loop
//!
//! [`Engine`] owns the claimed lines, the delay provider and the backlash
//! state behind a single mutex. A [`Drive`] supplies the variant-specific pin
//! work: what happens before the first step, on every step, and after the
//! last one.
//!
//! # Step loop
//!
//! ```text
//! lock ──► clear abort ──► begin ──┬──► abort? ──► step ──► position ± 1 ──┐
//!                                  │                                        │
//!                                  └────────────────────────────────────────┘
//!                                  └──► finish ──► record direction ──► unlock
//! ```
//!
//! Position and the phase index are committed per step, so a move cut short
//! by an abort or a failed write leaves them describing exactly the steps
//! that reached the pins.

use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};
use stepfocus_core::motion::BacklashState;
use stepfocus_core::traits::{Direction, EngineError, MoveReport, StepperEngine};
use stepfocus_hal::{ClaimedLines, GpioController, GpioError};

/// Pin work for one drive variant
pub trait Drive {
    /// Variant name used in log messages
    const NAME: &'static str;

    /// Prepare the hardware before the first step of a move
    fn begin<C: GpioController, T: DelayNs>(
        &mut self,
        lines: &mut ClaimedLines<C>,
        delay: &mut T,
        direction: Direction,
    ) -> Result<(), GpioError>;

    /// Perform one physical step, including its timing
    fn step<C: GpioController, T: DelayNs>(
        &mut self,
        lines: &mut ClaimedLines<C>,
        delay: &mut T,
        direction: Direction,
        step_delay_us: u32,
    ) -> Result<(), GpioError>;

    /// Leave the hardware idle after a completed or aborted move
    fn finish<C: GpioController>(&mut self, lines: &mut ClaimedLines<C>) -> Result<(), GpioError>;

    /// Best-effort shutdown after a failed write
    fn shutdown<C: GpioController>(&mut self, lines: &mut ClaimedLines<C>)
        -> Result<(), GpioError>;
}

/// Cloneable handle that stops the move in flight
///
/// The handle does not borrow the engine, so it can be moved to a UI or
/// signal thread while a worker thread is blocked in a move.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Request that the move in flight stops after its current step
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Everything a move mutates, guarded by the engine lock
pub(crate) struct EngineState<D, C: GpioController, T> {
    pub(crate) lines: ClaimedLines<C>,
    pub(crate) drive: D,
    pub(crate) delay: T,
    pub(crate) backlash: BacklashState,
    pub(crate) max_position: Option<u32>,
}

/// Engine lock held by a move
///
/// The moving flag is cleared before the lock is released, so a caller that
/// acquires the lock next never sees a stale `true`.
struct MoveGuard<'a, D, C: GpioController, T> {
    state: MutexGuard<'a, EngineState<D, C, T>>,
    moving: &'a AtomicBool,
}

impl<D, C: GpioController, T> Deref for MoveGuard<'_, D, C, T> {
    type Target = EngineState<D, C, T>;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl<D, C: GpioController, T> DerefMut for MoveGuard<'_, D, C, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.state
    }
}

impl<D, C: GpioController, T> Drop for MoveGuard<'_, D, C, T> {
    fn drop(&mut self) {
        self.moving.store(false, Ordering::SeqCst);
    }
}

/// Steps one `run` actually performed
#[derive(Debug, Clone, Copy, Default)]
struct Run {
    executed: i32,
    aborted: bool,
}

/// Stepper engine generic over its drive variant
///
/// Use the [`CoilPhaseEngine`](super::CoilPhaseEngine) and
/// [`PulseEngine`](super::PulseEngine) aliases rather than naming this type
/// directly. Dropping the engine drives every line to its safe level and
/// releases it.
pub struct Engine<D: Drive, C: GpioController, T: DelayNs> {
    state: Mutex<EngineState<D, C, T>>,
    position: AtomicI64,
    step_delay_us: AtomicU32,
    abort: Arc<AtomicBool>,
    moving: AtomicBool,
}

impl<D: Drive, C: GpioController, T: DelayNs> Engine<D, C, T> {
    /// Assemble an engine around lines that are already claimed
    pub(crate) fn from_parts(drive: D, lines: ClaimedLines<C>, step_delay_us: u32, delay: T) -> Self {
        Self {
            state: Mutex::new(EngineState {
                lines,
                drive,
                delay,
                backlash: BacklashState::default(),
                max_position: None,
            }),
            position: AtomicI64::new(0),
            step_delay_us: AtomicU32::new(step_delay_us),
            abort: Arc::new(AtomicBool::new(false)),
            moving: AtomicBool::new(false),
        }
    }

    /// Lock the engine state
    ///
    /// A panic in another thread cannot leave the state half-updated (every
    /// field is committed per step), so a poisoned lock is recovered.
    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineState<D, C, T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock for a move and forget any abort aimed at an earlier one
    fn lock_for_move(&self) -> MoveGuard<'_, D, C, T> {
        let state = self.lock();
        self.abort.store(false, Ordering::SeqCst);
        self.moving.store(true, Ordering::SeqCst);
        MoveGuard {
            state,
            moving: &self.moving,
        }
    }

    /// Handle that aborts moves of this engine from another thread
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            flag: Arc::clone(&self.abort),
        }
    }

    /// True while a move holds the engine lock
    ///
    /// Getters that briefly take the lock (`phase_index`, `last_direction`)
    /// do not count as moving.
    pub fn is_moving(&self) -> bool {
        self.moving.load(Ordering::SeqCst)
    }

    /// Execute `steps` with the lock already held
    fn run(&self, state: &mut EngineState<D, C, T>, steps: i32) -> Result<Run, EngineError> {
        let Some(direction) = Direction::from_steps(steps) else {
            return Ok(Run::default());
        };
        let total = steps.unsigned_abs();
        let EngineState {
            lines,
            drive,
            delay,
            backlash,
            ..
        } = state;

        if let Err(e) = drive.begin(lines, delay, direction) {
            return Err(self.fail(drive, lines, e));
        }

        let mut done: u32 = 0;
        let mut aborted = false;
        while done < total {
            if self.abort.load(Ordering::SeqCst) {
                aborted = true;
                break;
            }
            // Read once per step so both halves of a step use the same value
            let step_delay_us = self.step_delay_us.load(Ordering::SeqCst);
            if let Err(e) = drive.step(lines, delay, direction, step_delay_us) {
                if done > 0 {
                    backlash.record(direction);
                }
                return Err(self.fail(drive, lines, e));
            }
            done += 1;
            self.position
                .fetch_add(i64::from(direction.sign()), Ordering::SeqCst);
        }

        if done > 0 {
            backlash.record(direction);
        }
        if let Err(e) = drive.finish(lines) {
            return Err(self.fail(drive, lines, e));
        }
        if aborted {
            warn!("{} move aborted after {} of {} steps", D::NAME, done, total);
        }

        Ok(Run {
            executed: signed(done, direction),
            aborted,
        })
    }

    fn fail(&self, drive: &mut D, lines: &mut ClaimedLines<C>, e: GpioError) -> EngineError {
        error!("{} move stopped: {}", D::NAME, e);
        if let Err(shutdown) = drive.shutdown(lines) {
            warn!("{} safe shutdown incomplete: {}", D::NAME, shutdown);
        }
        e.into()
    }
}

/// Signed step count for `count` steps in `direction`
fn signed(count: u32, direction: Direction) -> i32 {
    // count never exceeds |requested|, so the product fits i32
    (i64::from(count) * i64::from(direction.sign())) as i32
}

impl<D: Drive, C: GpioController, T: DelayNs> StepperEngine for Engine<D, C, T> {
    fn move_steps(&self, steps: i32) -> Result<MoveReport, EngineError> {
        let mut state = self.lock_for_move();
        let run = self.run(&mut state, steps)?;
        let report = MoveReport {
            requested: steps,
            executed: run.executed,
            take_up: 0,
            aborted: run.aborted,
        };
        debug!(
            "{} move: requested {} position {:+}",
            D::NAME,
            steps,
            report.position_delta()
        );
        Ok(report)
    }

    fn move_with_backlash(&self, steps: i32) -> Result<MoveReport, EngineError> {
        let mut state = self.lock_for_move();
        let Some(direction) = Direction::from_steps(steps) else {
            return Ok(MoveReport::idle(steps));
        };

        let mut report = MoveReport::idle(steps);
        let take_up = state.backlash.take_up(direction);
        if let Some(take_up) = take_up {
            debug!("{} backlash take-up {} steps", D::NAME, take_up);
            let run = self.run(&mut state, take_up)?;
            report.take_up = run.executed;
            if run.aborted {
                report.aborted = true;
                return Ok(report);
            }
        }

        let run = self.run(&mut state, steps)?;
        report.executed = run.executed;
        report.aborted = run.aborted;
        debug!(
            "{} move: requested {} take-up {} position {:+}",
            D::NAME,
            steps,
            report.take_up,
            report.position_delta()
        );
        Ok(report)
    }

    fn move_to(&self, target: i64) -> Result<MoveReport, EngineError> {
        let mut state = self.lock_for_move();
        if let Some(max) = state.max_position {
            if !(0..=i64::from(max)).contains(&target) {
                return Err(EngineError::InvalidConfig("target outside travel range"));
            }
        }
        // Position only changes under the lock, so the delta is exact
        let steps = target
            .checked_sub(self.position.load(Ordering::SeqCst))
            .and_then(|delta| i32::try_from(delta).ok())
            .ok_or(EngineError::InvalidConfig("move distance exceeds i32 steps"))?;
        let run = self.run(&mut state, steps)?;
        let report = MoveReport {
            requested: steps,
            executed: run.executed,
            take_up: 0,
            aborted: run.aborted,
        };
        debug!(
            "{} move to {}: position {:+}",
            D::NAME,
            target,
            report.position_delta()
        );
        Ok(report)
    }

    fn set_step_delay_us(&self, delay_us: u32) -> Result<(), EngineError> {
        if delay_us == 0 {
            return Err(EngineError::InvalidStepDelay);
        }
        self.step_delay_us.store(delay_us, Ordering::SeqCst);
        Ok(())
    }

    fn step_delay_us(&self) -> u32 {
        self.step_delay_us.load(Ordering::SeqCst)
    }

    fn set_backlash_steps(&self, steps: u32) {
        self.lock().backlash.set_steps(steps);
    }

    fn backlash_steps(&self) -> u32 {
        self.lock().backlash.steps()
    }

    fn last_direction(&self) -> Option<Direction> {
        self.lock().backlash.last_direction()
    }

    fn set_max_position(&self, max: Option<u32>) {
        self.lock().max_position = max;
    }

    fn max_position(&self) -> Option<u32> {
        self.lock().max_position
    }

    fn position(&self) -> i64 {
        self.position.load(Ordering::SeqCst)
    }

    fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }
}

impl<D: Drive, C: GpioController, T: DelayNs> Drop for Engine<D, C, T> {
    fn drop(&mut self) {
        // ClaimedLines restores safe levels and releases after this
        info!(
            "{} engine released at position {}",
            D::NAME,
            self.position.load(Ordering::SeqCst)
        );
    }
}
