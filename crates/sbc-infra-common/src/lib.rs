//! Shared infrastructure for the SBC core crates.
//!
//! Provides the layers every other crate in this workspace leans on so that
//! the protocol and media crates stay free of framework concerns:
//!
//! - [`config`] — layered configuration (defaults, TOML file, CLI, env)
//! - [`logging`] — `tracing` subscriber setup
//! - [`errors`] — the common `Error` type used to compose per-crate errors
//! - [`events`] — a bounded pub/sub bus for call lifecycle events (C11)
//! - [`lifecycle`] — cooperative shutdown coordination

pub mod config;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod logging;

pub use config::SbcConfig;
pub use errors::{Error, Result};
pub use events::{EventBus, SbcEvent};
pub use logging::init_logging;
