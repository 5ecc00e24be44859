//! Dockhand library
//!
//! Session API for running ephemeral Docker service containers in test suites.

pub mod config;
pub mod docker;
pub mod logging;
pub mod network;

pub use config::{DockhandConfig, Timeouts};
pub use docker::{DockError, ErrorKind, Session};
