//! Configuration types
//!
//! Board-agnostic engine configuration, loadable from TOML.

pub mod engine;
#[cfg(feature = "toml")]
pub mod loader;
pub mod pins;

pub use engine::*;
#[cfg(feature = "toml")]
pub use loader::ConfigError;
pub use pins::*;
