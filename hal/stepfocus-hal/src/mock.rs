//! Recording GPIO backend for host-side tests
//!
//! Every call is appended to a shared, ordered event log. Clones of a
//! [`RecordingBackend`] share that log, so a test can hand one clone to an
//! engine and inspect the other. Failures can be injected for open, claim
//! and write.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::gpio::{GpioBackend, GpioController, GpioError};

/// Highest line number the mock controller exposes
pub const MOCK_MAX_LINE: u32 = 53;

/// One recorded backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioEvent {
    /// Controller opened
    Open { chip: u32 },
    /// Line claimed as output
    Claim { line: u32, level: bool },
    /// Level written
    Write { line: u32, level: bool },
    /// Line released
    Release { line: u32 },
    /// Controller closed
    Close,
}

#[derive(Debug, Default)]
struct MockState {
    events: Vec<GpioEvent>,
    /// Claimed lines and their current level
    claimed: BTreeMap<u32, bool>,
    /// Last level seen on every line ever touched
    levels: BTreeMap<u32, bool>,
    busy: Vec<u32>,
    /// Lines whose writes always fail
    broken: Vec<u32>,
    fail_open: bool,
    /// Successful writes remaining before writes start failing
    writes_before_failure: Option<usize>,
    open: bool,
}

/// In-memory backend recording every call
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    state: Arc<Mutex<MockState>>,
}

impl RecordingBackend {
    /// Create a backend with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `open` calls fail
    pub fn fail_open(&self) {
        self.state().fail_open = true;
    }

    /// Mark a line as held by another consumer
    pub fn mark_busy(&self, line: u32) {
        self.state().busy.push(line);
    }

    /// Let `count` more writes succeed, then fail every write
    pub fn fail_writes_after(&self, count: usize) {
        self.state().writes_before_failure = Some(count);
    }

    /// Make every write to `line` fail
    pub fn fail_writes_to(&self, line: u32) {
        self.state().broken.push(line);
    }

    /// Let writes succeed again
    pub fn heal_writes(&self) {
        let mut state = self.state();
        state.writes_before_failure = None;
        state.broken.clear();
    }

    /// Full ordered event log
    pub fn events(&self) -> Vec<GpioEvent> {
        self.state().events.clone()
    }

    /// Only the successful writes, in order
    pub fn writes(&self) -> Vec<(u32, bool)> {
        self.state()
            .events
            .iter()
            .filter_map(|event| match *event {
                GpioEvent::Write { line, level } => Some((line, level)),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded events (line state is kept)
    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// Last level driven on `line`, if it was ever touched
    pub fn level(&self, line: u32) -> Option<bool> {
        self.state().levels.get(&line).copied()
    }

    /// True if `line` is currently claimed
    pub fn is_claimed(&self, line: u32) -> bool {
        self.state().claimed.contains_key(&line)
    }

    /// Number of currently claimed lines
    pub fn claimed_count(&self) -> usize {
        self.state().claimed.len()
    }

    /// True while a controller handle is open
    pub fn is_open(&self) -> bool {
        self.state().open
    }
}

impl GpioBackend for RecordingBackend {
    type Controller = RecordingController;

    fn open(&self, chip: u32) -> Result<Self::Controller, GpioError> {
        let mut state = self.state();
        if state.fail_open || state.open {
            return Err(GpioError::ControllerUnavailable { chip });
        }
        state.open = true;
        state.events.push(GpioEvent::Open { chip });
        Ok(RecordingController {
            state: Arc::clone(&self.state),
            closed: false,
        })
    }
}

/// Controller handle returned by [`RecordingBackend::open`]
#[derive(Debug)]
pub struct RecordingController {
    state: Arc<Mutex<MockState>>,
    closed: bool,
}

impl RecordingController {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GpioController for RecordingController {
    fn claim_output(&mut self, line: u32, initial: bool) -> Result<(), GpioError> {
        let mut state = self.state();
        if line > MOCK_MAX_LINE || state.busy.contains(&line) || state.claimed.contains_key(&line)
        {
            return Err(GpioError::LineUnavailable { line });
        }
        state.claimed.insert(line, initial);
        state.levels.insert(line, initial);
        state.events.push(GpioEvent::Claim {
            line,
            level: initial,
        });
        Ok(())
    }

    fn write(&mut self, line: u32, level: bool) -> Result<(), GpioError> {
        let mut state = self.state();
        if !state.claimed.contains_key(&line) || state.broken.contains(&line) {
            return Err(GpioError::WriteFailed { line });
        }
        if let Some(remaining) = state.writes_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(GpioError::WriteFailed { line });
            }
            *remaining -= 1;
        }
        state.claimed.insert(line, level);
        state.levels.insert(line, level);
        state.events.push(GpioEvent::Write { line, level });
        Ok(())
    }

    fn release(&mut self, line: u32) {
        let mut state = self.state();
        if state.claimed.remove(&line).is_some() {
            state.events.push(GpioEvent::Release { line });
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut state = self.state();
        state.claimed.clear();
        state.open = false;
        state.events.push(GpioEvent::Close);
    }
}

/// `DelayNs` that never sleeps and totals the requested time
///
/// Clones share the running total.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    total_ns: Arc<AtomicU64>,
}

impl RecordingDelay {
    /// Create a delay with a zero total
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested time in microseconds
    pub fn total_us(&self) -> u64 {
        self.total_ns.load(Ordering::SeqCst) / 1_000
    }

    /// Reset the total to zero
    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::SeqCst);
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.fetch_add(u64::from(ns), Ordering::SeqCst);
    }

    fn delay_us(&mut self, us: u32) {
        self.total_ns
            .fetch_add(u64::from(us) * 1_000, Ordering::SeqCst);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns
            .fetch_add(u64::from(ms) * 1_000_000, Ordering::SeqCst);
    }
}
