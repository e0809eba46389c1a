//! stepfocus Hardware Abstraction Layer
//!
//! This crate defines the GPIO backend traits the drive engine is written
//! against. A backend opens a GPIO controller (a `/dev/gpiochipN` on Linux
//! boards), claims individual lines as outputs, writes levels and releases
//! them again.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Engines (stepfocus-drivers)            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  stepfocus-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ stepfocus-hal-│       │  mock (tests) │
//! │    rppal      │       │               │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Contents
//!
//! - [`gpio::GpioBackend`], [`gpio::GpioController`] - Line ownership and writes
//! - [`lines::ClaimedLines`] - Scoped owner that de-energizes and releases on drop
//! - [`delay::StdDelay`] - `DelayNs` implementation backed by thread sleeps
//! - `mock` - Recording backend for host tests (feature `mock`)

#![no_std]
#![deny(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "std")]
pub mod delay;
pub mod gpio;
pub mod lines;
#[cfg(feature = "mock")]
pub mod mock;

// Re-export key traits at crate root for convenience
#[cfg(feature = "std")]
pub use delay::StdDelay;
pub use gpio::{GpioBackend, GpioController, GpioError};
pub use lines::{ClaimedLines, MAX_LINES};
