//! Docker session: one runtime client plus time-bounded operations on it

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use bollard::container::{Config, RemoveContainerOptions};
use bollard::models::{ContainerInspectResponse, HostConfig};
use futures::StreamExt;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::config::{DockhandConfig, Timeouts};

use super::client::{BollardClient, RuntimeClient};
use super::error::DockError;
use super::ports;
use super::start::StartPoll;

/// A connection to a container runtime.
///
/// Every operation runs under its own budget from [`Timeouts`]; when it runs
/// out the in-flight request is dropped and `OperationTimedOut` is returned.
/// Nothing is retried. Concurrent calls on one session are not coordinated.
pub struct Session {
    client: Box<dyn RuntimeClient>,
    timeouts: Timeouts,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect to the configured daemon and check it answers a ping.
    ///
    /// Version negotiation and the ping share one connect budget.
    pub async fn connect(config: &DockhandConfig) -> Result<Self, DockError> {
        let client = BollardClient::new(config.docker_host.as_deref())
            .map_err(DockError::ClientConstruction)?;

        let deadline = Instant::now() + config.timeouts.connect();
        let client = match timeout_at(deadline, client.negotiate()).await {
            Ok(Ok(client)) => client,
            Ok(Err(err)) => return Err(DockError::Connectivity(err)),
            Err(_) => {
                return Err(DockError::Connectivity(
                    bollard::errors::Error::RequestTimeoutError,
                ))
            }
        };

        Self::ping_until(client, config.timeouts.clone(), deadline).await
    }

    /// Wrap an existing client, checking it answers a ping within the
    /// connect budget.
    pub async fn connect_with<C>(client: C, timeouts: Timeouts) -> Result<Self, DockError>
    where
        C: RuntimeClient + 'static,
    {
        let deadline = Instant::now() + timeouts.connect();
        Self::ping_until(client, timeouts, deadline).await
    }

    async fn ping_until<C>(
        client: C,
        timeouts: Timeouts,
        deadline: Instant,
    ) -> Result<Self, DockError>
    where
        C: RuntimeClient + 'static,
    {
        match timeout_at(deadline, client.ping()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(DockError::Connectivity(err)),
            Err(_) => {
                return Err(DockError::Connectivity(
                    bollard::errors::Error::RequestTimeoutError,
                ))
            }
        }

        info!("Connected to Docker daemon");

        Ok(Self {
            client: Box::new(client),
            timeouts,
        })
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Release the client's resources.
    pub async fn close(self) -> Result<(), DockError> {
        self.client.close().await?;
        debug!("Docker session closed");
        Ok(())
    }

    /// Succeeds iff a local image matches `image` exactly.
    ///
    /// `ImageNotPresent` means the daemon answered and has no such image;
    /// `ImageListingFailed` means presence could not be determined.
    pub async fn verify_image(&self, image: &str) -> Result<(), DockError> {
        within("image verify", self.timeouts.image_verify(), async {
            let images = self
                .client
                .list_images(image)
                .await
                .map_err(DockError::ImageListing)?;

            if images.is_empty() {
                return Err(DockError::ImageNotPresent {
                    image: image.to_string(),
                });
            }
            Ok::<_, DockError>(())
        })
        .await
    }

    /// Pull `image` unless it is already present.
    ///
    /// Only a definite `ImageNotPresent` leads to a pull; any other presence
    /// check failure is returned as-is.
    pub async fn pull_image(&self, image: &str) -> Result<(), DockError> {
        match self.verify_image(image).await {
            Ok(()) => {
                info!(image = %image, "Already have image, not pulling");
                return Ok(());
            }
            Err(DockError::ImageNotPresent { .. }) => {}
            Err(err) => return Err(err),
        }

        info!(image = %image, "Did not have image, pulling");

        within("image pull", self.timeouts.pull(), async {
            let mut progress =
                self.client
                    .pull_image(image)
                    .await
                    .map_err(|source| DockError::ImagePull {
                        image: image.to_string(),
                        source,
                    })?;

            // Completion is only signalled by the end of the stream.
            while let Some(message) = progress.next().await {
                let message = message.map_err(|source| DockError::ImageStreamRead {
                    image: image.to_string(),
                    source,
                })?;
                if let Some(status) = message.status {
                    debug!(image = %image, status = %status, "Pull progress");
                }
            }
            Ok::<_, DockError>(())
        })
        .await?;

        info!(image = %image, "Done pulling image");
        Ok(())
    }

    /// Create (but do not start) a container from `image` publishing each
    /// `host port -> container port` entry of `ports` on all interfaces.
    ///
    /// The container is removed by the daemon once it stops.
    pub async fn create_container(
        &self,
        image: &str,
        name: &str,
        ports: &HashMap<String, String>,
    ) -> Result<String, DockError> {
        let port_bindings = ports::translate(ports)?;

        let config = Config {
            image: Some(image.to_string()),
            tty: Some(false),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                auto_remove: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = within("container create", self.timeouts.create(), async {
            self.client
                .create_container(name, config)
                .await
                .map_err(|source| DockError::ContainerCreation {
                    image: image.to_string(),
                    name: name.to_string(),
                    source,
                })
        })
        .await?;

        for warning in &created.warnings {
            debug!(container_id = %created.id, warning = %warning, "Container create warning");
        }
        info!(container_id = %created.id, image = %image, name = %name, "Container created");

        Ok(created.id)
    }

    /// Start a created container and wait until the daemon reports it running.
    pub async fn start_container(&self, container_id: &str) -> Result<(), DockError> {
        StartPoll::new(
            self.client.as_ref(),
            container_id,
            self.timeouts.start(),
            self.timeouts.start_poll_interval(),
        )
        .run()
        .await?;

        info!(container_id = %container_id, "Container running");
        Ok(())
    }

    /// Current daemon-side view of a container. Errors are the daemon's own.
    pub async fn inspect_container(
        &self,
        container_id: &str,
    ) -> Result<ContainerInspectResponse, DockError> {
        within("container inspect", self.timeouts.inspect(), async {
            self.client
                .inspect_container(container_id)
                .await
                .map_err(DockError::Runtime)
        })
        .await
    }

    /// Force-remove a container and its anonymous volumes, stopping it first
    /// if it is running. Errors are the daemon's own.
    pub async fn remove_container(&self, container_id: &str) -> Result<(), DockError> {
        let options = RemoveContainerOptions {
            v: true,
            force: true,
            ..Default::default()
        };

        within("container remove", self.timeouts.remove_container(), async {
            self.client
                .remove_container(container_id, options)
                .await
                .map_err(DockError::Runtime)
        })
        .await?;

        info!(container_id = %container_id, "Container removed");
        Ok(())
    }

    /// Remove a local image. Errors are the daemon's own.
    pub async fn remove_image(&self, image: &str) -> Result<(), DockError> {
        within("image remove", self.timeouts.remove_image(), async {
            self.client
                .remove_image(image)
                .await
                .map_err(DockError::Runtime)
        })
        .await?;

        info!(image = %image, "Image removed");
        Ok(())
    }
}

/// Run `operation` under `budget`, mapping expiry to `OperationTimedOut`.
async fn within<T, F>(operation: &'static str, budget: Duration, fut: F) -> Result<T, DockError>
where
    F: Future<Output = Result<T, DockError>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(DockError::timeout(operation, budget)),
    }
}
