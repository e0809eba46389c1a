//! Backlash take-up bookkeeping
//!
//! Gear trains have slack. After a reversal the first few steps only take
//! that slack up and produce no output motion. The compensation runs an
//! extra move of `steps` in the new direction before the requested move.
//!
//! The last direction is tracked for every executed move, compensated or
//! not, because the slack sits on whichever side the motor last pushed.

use crate::traits::Direction;

/// Configured take-up distance plus the last commanded direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BacklashState {
    steps: u32,
    last_direction: Option<Direction>,
}

impl BacklashState {
    /// Create with a take-up distance and no direction history
    pub fn new(steps: u32) -> Self {
        Self {
            steps,
            last_direction: None,
        }
    }

    /// Configured take-up distance
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Change the take-up distance (0 disables compensation)
    pub fn set_steps(&mut self, steps: u32) {
        self.steps = steps;
    }

    /// Direction of the last executed move
    pub fn last_direction(&self) -> Option<Direction> {
        self.last_direction
    }

    /// Signed take-up move required before moving in `direction`
    ///
    /// `None` when compensation is disabled, when there is no history yet,
    /// or when the direction does not change.
    pub fn take_up(&self, direction: Direction) -> Option<i32> {
        if self.steps == 0 {
            return None;
        }
        match self.last_direction {
            Some(last) if last != direction => {
                let steps = i32::try_from(self.steps).unwrap_or(i32::MAX);
                Some(steps * direction.sign())
            }
            _ => None,
        }
    }

    /// Record that a move in `direction` was executed
    pub fn record(&mut self, direction: Direction) {
        self.last_direction = Some(direction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_move_has_no_take_up() {
        let state = BacklashState::new(5);
        assert_eq!(state.take_up(Direction::Forward), None);
        assert_eq!(state.take_up(Direction::Reverse), None);
    }

    #[test]
    fn test_take_up_only_on_reversal() {
        let mut state = BacklashState::new(5);
        state.record(Direction::Forward);

        assert_eq!(state.take_up(Direction::Forward), None);
        assert_eq!(state.take_up(Direction::Reverse), Some(-5));

        state.record(Direction::Reverse);
        assert_eq!(state.take_up(Direction::Reverse), None);
        assert_eq!(state.take_up(Direction::Forward), Some(5));
    }

    #[test]
    fn test_zero_steps_disables() {
        let mut state = BacklashState::new(0);
        state.record(Direction::Forward);
        assert_eq!(state.take_up(Direction::Reverse), None);

        state.set_steps(3);
        assert_eq!(state.take_up(Direction::Reverse), Some(-3));
        assert_eq!(state.last_direction(), Some(Direction::Forward));
    }

    #[test]
    fn test_huge_take_up_saturates() {
        let mut state = BacklashState::new(u32::MAX);
        state.record(Direction::Reverse);
        assert_eq!(state.take_up(Direction::Forward), Some(i32::MAX));
    }
}
