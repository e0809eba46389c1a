//! Scoped ownership of claimed output lines
//!
//! [`ClaimedLines`] owns an opened controller together with every line
//! claimed through it. Each line is registered with the level that leaves
//! the motor de-energized. When the owner is dropped, for whatever reason,
//! every line is driven to that level, released, and the controller is
//! closed.
//!
//! This is what makes construction rollback trivial: an engine that fails to
//! claim its third line simply drops the half-filled owner.

use heapless::Vec;
use log::warn;

use crate::gpio::{GpioController, GpioError};

/// Maximum lines a single owner tracks
///
/// A pulse driver needs six (DIR, STEP, ENABLE, MODE0..2), a coil driver four.
pub const MAX_LINES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClaimedLine {
    line: u32,
    safe_level: bool,
}

/// Controller handle plus the lines claimed on it
pub struct ClaimedLines<C: GpioController> {
    controller: C,
    lines: Vec<ClaimedLine, MAX_LINES>,
}

impl<C: GpioController> ClaimedLines<C> {
    /// Take ownership of an opened controller
    pub fn new(controller: C) -> Self {
        Self {
            controller,
            lines: Vec::new(),
        }
    }

    /// Claim `line` as an output, starting at (and returning to) `safe_level`
    pub fn claim(&mut self, line: u32, safe_level: bool) -> Result<(), GpioError> {
        if self.lines.is_full() {
            return Err(GpioError::TooManyLines);
        }
        self.controller.claim_output(line, safe_level)?;
        self.lines
            .push(ClaimedLine { line, safe_level })
            .map_err(|_| GpioError::TooManyLines)
    }

    /// Drive a claimed line
    pub fn write(&mut self, line: u32, level: bool) -> Result<(), GpioError> {
        self.controller.write(line, level)
    }

    /// Drive every line to its safe level
    ///
    /// All lines are attempted even if one write fails; the first failure
    /// is returned.
    pub fn safe_state(&mut self) -> Result<(), GpioError> {
        let mut result = Ok(());
        for claimed in self.lines.iter() {
            if let Err(e) = self.controller.write(claimed.line, claimed.safe_level) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Line numbers in claim order
    pub fn lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.lines.iter().map(|claimed| claimed.line)
    }

    /// Number of claimed lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if nothing has been claimed yet
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl<C: GpioController> Drop for ClaimedLines<C> {
    fn drop(&mut self) {
        // The lines are released regardless of write errors
        if let Err(e) = self.safe_state() {
            warn!("teardown could not restore safe levels: {}", e);
        }
        for claimed in self.lines.iter().rev() {
            self.controller.release(claimed.line);
        }
        self.lines.clear();
        self.controller.close();
    }
}
