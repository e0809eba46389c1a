//! Coil energization tables
//!
//! A coil-phase engine walks a fixed table of 4-line patterns. One table
//! column per coil line, in the order the lines are assigned. Moving one
//! step forward selects the next row (wrapping), one step back the
//! previous row.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::traits::{Direction, EngineError};

/// Levels for the four coil lines
pub type CoilPattern = [bool; 4];

/// Maximum table length (half-step)
pub const MAX_PHASES: usize = 8;

/// Wave drive: one coil at a time
pub const WAVE: [CoilPattern; 4] = [
    [true, false, false, false],
    [false, true, false, false],
    [false, false, true, false],
    [false, false, false, true],
];

/// Two-phase full step: two adjacent coils at a time, more torque
pub const FULL_STEP: [CoilPattern; 4] = [
    [true, true, false, false],
    [false, true, true, false],
    [false, false, true, true],
    [true, false, false, true],
];

/// Half step: alternates one and two energized coils
pub const HALF_STEP: [CoilPattern; 8] = [
    [true, false, false, false],
    [true, true, false, false],
    [false, true, false, false],
    [false, true, true, false],
    [false, false, true, false],
    [false, false, true, true],
    [false, false, false, true],
    [true, false, false, true],
];

/// Built-in energization sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PhaseSequence {
    /// 4 states, single coil
    #[default]
    Wave,
    /// 4 states, two coils
    FullStep,
    /// 8 states, twice the angular resolution
    HalfStep,
}

impl PhaseSequence {
    /// Rows of this sequence
    pub fn patterns(self) -> &'static [CoilPattern] {
        match self {
            PhaseSequence::Wave => &WAVE,
            PhaseSequence::FullStep => &FULL_STEP,
            PhaseSequence::HalfStep => &HALF_STEP,
        }
    }
}

/// Number of coil lines that differ between two patterns
pub fn bit_flips(a: &CoilPattern, b: &CoilPattern) -> u32 {
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() as u32
}

/// Immutable phase table of 4 or 8 rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTable {
    entries: Vec<CoilPattern, MAX_PHASES>,
}

impl PhaseTable {
    /// Table for a built-in sequence
    pub fn from_sequence(sequence: PhaseSequence) -> Self {
        let mut entries = Vec::new();
        for pattern in sequence.patterns() {
            // Built-in sequences never exceed MAX_PHASES
            let _ = entries.push(*pattern);
        }
        Self { entries }
    }

    /// Table from caller-supplied rows
    ///
    /// Accepts 4 rows (full step) or 8 rows (half step). An 8-row table must
    /// change exactly one coil between neighbouring rows, wrap-around
    /// included.
    pub fn custom(rows: &[CoilPattern]) -> Result<Self, EngineError> {
        if rows.len() != 4 && rows.len() != 8 {
            return Err(EngineError::InvalidConfig(
                "phase table must have 4 or 8 entries",
            ));
        }
        let entries = Vec::from_slice(rows)
            .map_err(|_| EngineError::InvalidConfig("phase table too long"))?;
        let table = Self { entries };
        if table.len() == MAX_PHASES && !table.is_single_bit_adjacent() {
            return Err(EngineError::InvalidConfig(
                "half-step table rows must differ by one coil",
            ));
        }
        Ok(table)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed table
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All rows in order
    pub fn entries(&self) -> &[CoilPattern] {
        &self.entries
    }

    /// Row at `index`, wrapping
    pub fn pattern(&self, index: usize) -> CoilPattern {
        self.entries[index % self.entries.len()]
    }

    /// Index one step from `index` in `direction`
    pub fn advance(&self, index: usize, direction: Direction) -> usize {
        let len = self.entries.len();
        match direction {
            Direction::Forward => (index + 1) % len,
            Direction::Reverse => (index + len - 1) % len,
        }
    }

    /// True if every pair of neighbouring rows (cyclically) differs in
    /// exactly one coil
    pub fn is_single_bit_adjacent(&self) -> bool {
        let len = self.entries.len();
        (0..len).all(|i| bit_flips(&self.entries[i], &self.entries[(i + 1) % len]) == 1)
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self::from_sequence(PhaseSequence::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_half_step_adjacency() {
        let table = PhaseTable::from_sequence(PhaseSequence::HalfStep);
        assert_eq!(table.len(), 8);
        assert!(table.is_single_bit_adjacent());
        for i in 0..8 {
            assert_eq!(bit_flips(&HALF_STEP[i], &HALF_STEP[(i + 1) % 8]), 1);
        }
    }

    #[test]
    fn test_full_step_tables_are_not_half_step() {
        // Full-step rows move two coils at a time
        assert!(!PhaseTable::from_sequence(PhaseSequence::Wave).is_single_bit_adjacent());
        assert!(!PhaseTable::from_sequence(PhaseSequence::FullStep).is_single_bit_adjacent());
    }

    #[test]
    fn test_every_row_energizes_a_coil() {
        for sequence in [
            PhaseSequence::Wave,
            PhaseSequence::FullStep,
            PhaseSequence::HalfStep,
        ] {
            for pattern in sequence.patterns() {
                assert!(pattern.iter().any(|&on| on), "{:?}", sequence);
            }
        }
    }

    #[test]
    fn test_default_is_wave() {
        let table = PhaseTable::default();
        assert_eq!(table.entries(), &WAVE);
        assert_eq!(table.pattern(1), [false, true, false, false]);
    }

    #[test]
    fn test_advance_wraps_both_ways() {
        let table = PhaseTable::from_sequence(PhaseSequence::HalfStep);
        assert_eq!(table.advance(7, Direction::Forward), 0);
        assert_eq!(table.advance(0, Direction::Reverse), 7);
        assert_eq!(table.advance(3, Direction::Forward), 4);
    }

    #[test]
    fn test_custom_table_length() {
        assert!(PhaseTable::custom(&WAVE[..3]).is_err());
        assert!(PhaseTable::custom(&[]).is_err());
        assert!(PhaseTable::custom(&FULL_STEP).is_ok());
        assert!(PhaseTable::custom(&HALF_STEP).is_ok());
    }

    #[test]
    fn test_custom_half_step_must_be_adjacent() {
        let mut rows = HALF_STEP;
        rows.swap(1, 2);
        assert_eq!(
            PhaseTable::custom(&rows),
            Err(EngineError::InvalidConfig(
                "half-step table rows must differ by one coil"
            ))
        );
    }

    proptest! {
        #[test]
        fn prop_reverse_retraces_forward(start in 0usize..8, steps in 0usize..200) {
            let table = PhaseTable::from_sequence(PhaseSequence::HalfStep);
            let mut index = start;
            for _ in 0..steps {
                index = table.advance(index, Direction::Forward);
            }
            prop_assert_eq!(index, (start + steps) % table.len());
            for _ in 0..steps {
                index = table.advance(index, Direction::Reverse);
            }
            prop_assert_eq!(index, start);
        }
    }
}
