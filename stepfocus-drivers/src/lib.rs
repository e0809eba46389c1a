//! Stepper engine implementations
//!
//! This crate provides the concrete engines behind the
//! [`StepperEngine`](stepfocus_core::traits::StepperEngine) trait defined in
//! stepfocus-core:
//!
//! - Coil-phase engine (ULN2003 + 28BYJ-48 style, four coil lines)
//! - Pulse engine (DRV8825 / Waveshare Stepper HAT (B), STEP/DIR/ENABLE)
//!
//! Both run on top of any [`GpioBackend`](stepfocus_hal::GpioBackend) and any
//! `embedded_hal::delay::DelayNs`.

#![deny(unsafe_code)]

pub mod stepper;
