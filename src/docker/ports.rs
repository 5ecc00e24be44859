//! Host to container port binding translation

use std::collections::HashMap;
use std::fmt;
use std::num::ParseIntError;

use bollard::models::{PortBinding, PortMap};
use thiserror::Error;

/// Host address every binding listens on.
pub const BIND_ALL_INTERFACES: &str = "0.0.0.0";

#[derive(Debug, Error)]
pub enum PortMappingError {
    #[error("invalid container port {port:?}")]
    InvalidContainerPort {
        port: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid host port {port:?}")]
    InvalidHostPort {
        port: String,
        #[source]
        source: ParseIntError,
    },
}

/// A TCP container port, rendered the way the Docker API keys port maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerPort(u16);

impl ContainerPort {
    pub fn tcp(port: u16) -> Self {
        Self(port)
    }

    pub fn number(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ContainerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/tcp", self.0)
    }
}

impl std::str::FromStr for ContainerPort {
    type Err = PortMappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u16>()
            .map(ContainerPort)
            .map_err(|source| PortMappingError::InvalidContainerPort {
                port: s.to_string(),
                source,
            })
    }
}

/// Translate a `host port -> container port` map into Docker port bindings.
///
/// The first malformed entry aborts the whole translation.
pub fn translate(ports: &HashMap<String, String>) -> Result<PortMap, PortMappingError> {
    let mut port_map = PortMap::with_capacity(ports.len());

    for (host_port, container_port) in ports {
        let container_port: ContainerPort = container_port.parse()?;
        host_port
            .parse::<u16>()
            .map_err(|source| PortMappingError::InvalidHostPort {
                port: host_port.clone(),
                source,
            })?;

        port_map.insert(
            container_port.to_string(),
            Some(vec![PortBinding {
                host_ip: Some(BIND_ALL_INTERFACES.to_string()),
                host_port: Some(host_port.clone()),
            }]),
        );
    }

    Ok(port_map)
}
