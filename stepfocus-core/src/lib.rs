//! Board-agnostic core of the stepper drive engine
//!
//! This crate contains everything that does not touch a GPIO line:
//!
//! - Engine trait, move reports and the error type
//! - Coil phase tables and DRV8825 microstep modes
//! - Backlash take-up bookkeeping
//! - Configuration types, validation and TOML loading

#![deny(unsafe_code)]

pub mod config;
pub mod motion;
pub mod traits;
