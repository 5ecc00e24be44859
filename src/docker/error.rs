//! Docker session error handling

use std::time::Duration;

use thiserror::Error;

use super::ports::PortMappingError;

/// Errors reported by [`Session`](super::Session) operations.
///
/// Each variant keeps the underlying cause as its source. Match on
/// [`DockError::kind`] rather than on the rendered message.
#[derive(Debug, Error)]
pub enum DockError {
    #[error("error creating docker client")]
    ClientConstruction(#[source] bollard::errors::Error),

    #[error("error connecting to docker")]
    Connectivity(#[source] bollard::errors::Error),

    #[error("error listing docker images")]
    ImageListing(#[source] bollard::errors::Error),

    #[error("docker image is not present: {image}")]
    ImageNotPresent { image: String },

    #[error("error pulling image: {image}")]
    ImagePull {
        image: String,
        #[source]
        source: bollard::errors::Error,
    },

    #[error("error reading image during pull: {image}")]
    ImageStreamRead {
        image: String,
        #[source]
        source: bollard::errors::Error,
    },

    #[error("error creating container {name} from image {image}")]
    ContainerCreation {
        image: String,
        name: String,
        #[source]
        source: bollard::errors::Error,
    },

    #[error("error starting container: {container_id}")]
    ContainerStart {
        container_id: String,
        #[source]
        source: bollard::errors::Error,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("portmap error")]
    PortMapping(#[from] PortMappingError),

    /// Daemon error passed through as-is (container and image removal).
    #[error(transparent)]
    Runtime(#[from] bollard::errors::Error),
}

/// Matchable classification of a [`DockError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ClientConstructionFailed,
    ConnectivityFailed,
    ImageListingFailed,
    ImageNotPresent,
    ImagePullFailed,
    ImageStreamReadFailed,
    ContainerCreationFailed,
    ContainerStartFailed,
    OperationTimedOut,
    PortMappingInvalid,
    Runtime,
}

impl DockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DockError::ClientConstruction(_) => ErrorKind::ClientConstructionFailed,
            DockError::Connectivity(_) => ErrorKind::ConnectivityFailed,
            DockError::ImageListing(_) => ErrorKind::ImageListingFailed,
            DockError::ImageNotPresent { .. } => ErrorKind::ImageNotPresent,
            DockError::ImagePull { .. } => ErrorKind::ImagePullFailed,
            DockError::ImageStreamRead { .. } => ErrorKind::ImageStreamReadFailed,
            DockError::ContainerCreation { .. } => ErrorKind::ContainerCreationFailed,
            DockError::ContainerStart { .. } => ErrorKind::ContainerStartFailed,
            DockError::Timeout { .. } => ErrorKind::OperationTimedOut,
            DockError::PortMapping(_) => ErrorKind::PortMappingInvalid,
            DockError::Runtime(_) => ErrorKind::Runtime,
        }
    }

    pub(crate) fn timeout(operation: &'static str, after: Duration) -> Self {
        DockError::Timeout { operation, after }
    }
}
