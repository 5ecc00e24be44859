//! Runtime client adapter over the Docker API

use std::collections::HashMap;
use std::io;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    StartContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::{CreateImageOptions, ListImagesOptions, RemoveImageOptions};
use bollard::models::{
    ContainerCreateResponse, ContainerInspectResponse, CreateImageInfo, ImageSummary,
};
use bollard::Docker;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tracing::debug;

/// Progress messages of an image pull. The pull is only complete once the
/// stream is exhausted.
pub type PullStream = BoxStream<'static, Result<CreateImageInfo, DockerError>>;

/// The calls a [`Session`](super::Session) makes against a container runtime.
///
/// Implementations do not apply deadlines themselves; the session drops the
/// returned future when an operation's budget runs out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    async fn ping(&self) -> Result<(), DockerError>;

    /// Local images whose reference matches exactly.
    async fn list_images(&self, reference: &str) -> Result<Vec<ImageSummary>, DockerError>;

    /// Begin pulling `reference`. Request-level failures are returned here;
    /// failures after the daemon accepted the pull arrive on the stream.
    async fn pull_image(&self, reference: &str) -> Result<PullStream, DockerError>;

    async fn create_container(
        &self,
        name: &str,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, DockerError>;

    async fn start_container(&self, id: &str) -> Result<(), DockerError>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, DockerError>;

    async fn remove_container(
        &self,
        id: &str,
        options: RemoveContainerOptions,
    ) -> Result<(), DockerError>;

    async fn remove_image(&self, reference: &str) -> Result<(), DockerError>;

    /// Release connections held by the client.
    async fn close(&self) -> Result<(), DockerError>;
}

/// Per-request timeout handed to bollard; session budgets are always shorter.
const CLIENT_TIMEOUT_SECS: u64 = 120;

/// [`RuntimeClient`] backed by a bollard [`Docker`] handle.
#[derive(Clone)]
pub struct BollardClient {
    docker: Docker,
}

impl BollardClient {
    /// Build a client for `docker_host`, or from the local defaults
    /// (`DOCKER_HOST`, then the platform socket) when unset.
    ///
    /// No request is made; use [`negotiate`](Self::negotiate) or
    /// [`RuntimeClient::ping`] to reach the daemon.
    pub fn new(docker_host: Option<&str>) -> Result<Self, DockerError> {
        let docker = match docker_host {
            None => Docker::connect_with_local_defaults()?,
            #[cfg(unix)]
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, CLIENT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)?
            }
            Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
                Docker::connect_with_http(host, CLIENT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)?
            }
            Some(host) => {
                return Err(DockerError::IOError {
                    err: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("unsupported docker host: {host}"),
                    ),
                })
            }
        };

        Ok(Self { docker })
    }

    /// Downgrade the API version to what the daemon supports.
    pub async fn negotiate(self) -> Result<Self, DockerError> {
        let docker = self.docker.negotiate_version().await?;
        debug!("Negotiated docker API version");
        Ok(Self { docker })
    }
}

#[async_trait]
impl RuntimeClient for BollardClient {
    async fn ping(&self) -> Result<(), DockerError> {
        self.docker.ping().await.map(|_| ())
    }

    async fn list_images(&self, reference: &str) -> Result<Vec<ImageSummary>, DockerError> {
        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![reference.to_string()]);

        self.docker
            .list_images(Some(ListImagesOptions::<String> {
                filters,
                ..Default::default()
            }))
            .await
    }

    async fn pull_image(&self, reference: &str) -> Result<PullStream, DockerError> {
        let (from_image, tag) = split_reference(reference);
        let options = CreateImageOptions {
            from_image: from_image.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };

        // The request goes out on first poll; surface its failure directly.
        let mut progress = Box::pin(self.docker.create_image(Some(options), None, None));
        match progress.next().await {
            Some(Err(err)) => Err(err),
            first => Ok(stream::iter(first).chain(progress).boxed()),
        }
    }

    async fn create_container(
        &self,
        name: &str,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, DockerError> {
        let options = CreateContainerOptions {
            name: name.to_string(),
            ..Default::default()
        };
        self.docker.create_container(Some(options), config).await
    }

    async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, DockerError> {
        self.docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
    }

    async fn remove_container(
        &self,
        id: &str,
        options: RemoveContainerOptions,
    ) -> Result<(), DockerError> {
        self.docker.remove_container(id, Some(options)).await
    }

    async fn remove_image(&self, reference: &str) -> Result<(), DockerError> {
        self.docker
            .remove_image(reference, None::<RemoveImageOptions>, None)
            .await
            .map(|_| ())
    }

    async fn close(&self) -> Result<(), DockerError> {
        // The hyper connection pool is released when the last handle drops.
        Ok(())
    }
}

/// Split `repo[:tag]` for the create-image call. Digest references are
/// passed whole; a missing tag means `latest`.
fn split_reference(reference: &str) -> (&str, &str) {
    if reference.contains('@') {
        return (reference, "");
    }

    let name_start = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    match reference[name_start..].rfind(':') {
        Some(i) => {
            let split = name_start + i;
            (&reference[..split], &reference[split + 1..])
        }
        None => (reference, "latest"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_reference_with_tag() {
        assert_eq!(
            split_reference("hashicorp/http-echo:latest"),
            ("hashicorp/http-echo", "latest")
        );
        assert_eq!(split_reference("alpine:3.19"), ("alpine", "3.19"));
    }

    #[test]
    fn test_split_reference_defaults_to_latest() {
        assert_eq!(split_reference("alpine"), ("alpine", "latest"));
    }

    #[test]
    fn test_split_reference_registry_port() {
        assert_eq!(
            split_reference("localhost:5000/team/app"),
            ("localhost:5000/team/app", "latest")
        );
        assert_eq!(
            split_reference("localhost:5000/team/app:v2"),
            ("localhost:5000/team/app", "v2")
        );
    }

    #[test]
    fn test_split_reference_digest() {
        let reference = "alpine@sha256:0123456789abcdef";
        assert_eq!(split_reference(reference), (reference, ""));
    }

    #[tokio::test]
    async fn test_new_from_http_host_makes_no_request() {
        let client = BollardClient::new(Some("tcp://127.0.0.1:2375"));
        assert!(client.is_ok());
    }

    #[test]
    fn test_new_rejects_unknown_scheme() {
        let err = BollardClient::new(Some("ssh://builder@10.0.0.7")).err().unwrap();
        assert!(matches!(
            err,
            DockerError::IOError { ref err } if err.kind() == io::ErrorKind::InvalidInput
        ));
    }
}
