//! Docker session module for Dockhand
//!
//! Drives a Docker-compatible daemon for test fixtures:
//! - Checking for and pulling images
//! - Creating containers with published ports
//! - Starting containers and waiting until they run
//! - Removing containers and images

mod client;
mod error;
pub mod ports;
mod session;
mod start;

pub use client::{BollardClient, PullStream, RuntimeClient};
pub use error::{DockError, ErrorKind};
pub use ports::{ContainerPort, PortMappingError};
pub use session::Session;
pub use start::{StartPhase, StartPoll};
