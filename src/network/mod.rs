//! Host port allocation for published container ports

use std::io;
use std::net::{Ipv4Addr, TcpListener};

use tracing::debug;

/// Ask the OS for a currently unused TCP port on the loopback interface.
///
/// The listener is closed before returning, so another process may claim the
/// port before the caller binds it.
pub fn free_port() -> io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    let port = listener.local_addr()?.port();
    debug!(port, "Allocated free host port");
    Ok(port)
}
