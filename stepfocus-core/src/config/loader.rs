//! TOML configuration loading
//!
//! ```toml
//! step_delay_us = 1500
//! backlash_steps = 12
//! max_position = 50000
//!
//! [drive]
//! type = "coil_phase"
//! sequence = "half_step"
//! hold_after_move = false
//!
//! [drive.pins]
//! chip = 0
//! coil_a1 = 12
//! coil_a2 = 13
//! coil_b1 = 19
//! coil_b2 = 16
//! ```
//!
//! Missing keys take the defaults of the corresponding config type. A
//! missing `step_delay_us` takes the default of the selected drive variant.

use core::fmt;

use serde::Deserialize;

use super::engine::{DriveConfig, EngineConfig};
use crate::traits::EngineError;

/// Configuration load error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// TOML syntax or type error
    Parse(String),
    /// Parsed, but rejected by validation
    Invalid(EngineError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::Invalid(e) => write!(f, "config rejected: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<EngineError> for ConfigError {
    fn from(e: EngineError) -> Self {
        ConfigError::Invalid(e)
    }
}

/// Raw file layout; `step_delay_us` stays optional so the variant default
/// can fill it in.
#[derive(Debug, Deserialize)]
struct RawConfig {
    step_delay_us: Option<u32>,
    #[serde(default)]
    backlash_steps: u32,
    #[serde(default)]
    max_position: Option<u32>,
    #[serde(default)]
    drive: DriveConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let config = EngineConfig {
            step_delay_us: raw
                .step_delay_us
                .unwrap_or_else(|| raw.drive.default_step_delay_us()),
            backlash_steps: raw.backlash_steps,
            max_position: raw.max_position,
            drive: raw.drive,
        };
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoilPhaseConfig, PulseConfig, DEFAULT_PULSE_STEP_DELAY_US};
    use crate::motion::{MicrostepMode, PhaseSequence};

    #[test]
    fn test_empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_coil_phase_document() {
        let input = r#"
            step_delay_us = 1500
            backlash_steps = 12
            max_position = 50000

            [drive]
            type = "coil_phase"
            sequence = "half_step"
            hold_after_move = false

            [drive.pins]
            chip = 0
            coil_a1 = 5
            coil_a2 = 6
            coil_b1 = 13
            coil_b2 = 26
        "#;

        let config = EngineConfig::from_toml_str(input).unwrap();
        assert_eq!(config.step_delay_us, 1500);
        assert_eq!(config.backlash_steps, 12);
        assert_eq!(config.max_position, Some(50_000));
        match config.drive {
            DriveConfig::CoilPhase(CoilPhaseConfig {
                pins,
                sequence,
                hold_after_move,
                settle_us,
            }) => {
                assert_eq!(pins.lines(), [5, 6, 13, 26]);
                assert_eq!(sequence, PhaseSequence::HalfStep);
                assert!(!hold_after_move);
                assert_eq!(settle_us, 0);
            }
            other => panic!("unexpected drive {:?}", other),
        }
    }

    #[test]
    fn test_pulse_document_uses_variant_defaults() {
        let input = r#"
            [drive]
            type = "pulse"
            microstep = "eighth"

            [drive.pins]
            dir = 13
            step = 19
            enable = 12
            mode = [16, 17, 20]
        "#;

        let config = EngineConfig::from_toml_str(input).unwrap();
        assert_eq!(config.step_delay_us, DEFAULT_PULSE_STEP_DELAY_US);
        assert_eq!(config.max_position, None);
        match config.drive {
            DriveConfig::Pulse(PulseConfig {
                pins, microstep, ..
            }) => {
                assert_eq!(pins.lines().as_slice(), &[13, 19, 12, 16, 17, 20]);
                assert_eq!(microstep, MicrostepMode::Eighth);
            }
            other => panic!("unexpected drive {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_reported() {
        let result = EngineConfig::from_toml_str("step_delay_us = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_drive_type_reported() {
        let result = EngineConfig::from_toml_str("[drive]\ntype = \"servo\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_applied() {
        let result = EngineConfig::from_toml_str("step_delay_us = 0\n");
        assert_eq!(
            result,
            Err(ConfigError::Invalid(EngineError::InvalidStepDelay))
        );

        let duplicate = r#"
            [drive]
            type = "pulse"
            [drive.pins]
            dir = 18
            step = 18
        "#;
        assert!(matches!(
            EngineConfig::from_toml_str(duplicate),
            Err(ConfigError::Invalid(EngineError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = EngineConfig {
            backlash_steps: 7,
            max_position: Some(20_000),
            ..EngineConfig::new(DriveConfig::CoilPhase(CoilPhaseConfig::default()))
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_negative_max_position_rejected() {
        let result = EngineConfig::from_toml_str("max_position = -10\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
