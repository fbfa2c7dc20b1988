//! Docker daemon backend for the runtime capability traits.
//!
//! Talks to a local Docker daemon through the bollard client. Docker merges
//! the container and task abstractions, so [`DockerTask`] operates on the
//! same underlying container as its [`DockerContainer`]; deleting the task
//! removes the container, and the container delete tolerates an already-gone
//! target.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, KillContainerOptions,
    ListContainersOptions, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerStateStatusEnum, HostConfig};
use bollard::Docker;
use futures::StreamExt;
use oci_spec::runtime::{ProcessBuilder, Spec, SpecBuilder};
use stoker_common::{StokerError, StokerResult};
use tokio::sync::oneshot;

use super::client::{
    Container, ContainerOptions, ExitStatus, Image, RegistryAuth, RuntimeClient, Signal, Task,
    TaskStatus,
};

fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn runtime_error(err: bollard::errors::Error) -> StokerError {
    StokerError::Runtime {
        reason: err.to_string(),
    }
}

/// Runtime client backed by a local Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the daemon using the platform defaults
    /// (`/var/run/docker.sock` on Unix, honoring `DOCKER_HOST`).
    pub fn connect() -> StokerResult<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(runtime_error)?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl RuntimeClient for DockerRuntime {
    async fn containers(&self, name_filter: &str) -> StokerResult<Vec<Arc<dyn Container>>> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![name_filter.to_string()]);

        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(runtime_error)?;

        Ok(summaries
            .into_iter()
            .filter_map(|summary| summary.id)
            .map(|id| {
                Arc::new(DockerContainer {
                    docker: self.docker.clone(),
                    id,
                }) as Arc<dyn Container>
            })
            .collect())
    }

    async fn get_image(&self, reference: &str) -> StokerResult<Arc<dyn Image>> {
        match self.docker.inspect_image(reference).await {
            Ok(_) => Ok(Arc::new(DockerImage {
                name: reference.to_string(),
            })),
            Err(err) if is_not_found(&err) => Err(StokerError::ImageNotFound {
                reference: reference.to_string(),
            }),
            Err(err) => Err(runtime_error(err)),
        }
    }

    async fn pull_image(
        &self,
        reference: &str,
        auth: Option<&RegistryAuth>,
    ) -> StokerResult<Arc<dyn Image>> {
        let options = CreateImageOptions::<String> {
            from_image: reference.to_string(),
            ..Default::default()
        };
        let credentials = auth.map(|auth| DockerCredentials {
            username: auth.username.clone(),
            password: auth.password.clone(),
            identitytoken: auth.identity_token.clone(),
            serveraddress: auth.server_address.clone(),
            ..Default::default()
        });

        tracing::info!(reference, "pulling image");
        let mut progress = self.docker.create_image(Some(options), None, credentials);
        while let Some(update) = progress.next().await {
            let update = update.map_err(runtime_error)?;
            if let Some(status) = update.status {
                tracing::debug!(reference, %status, "pull progress");
            }
        }

        Ok(Arc::new(DockerImage {
            name: reference.to_string(),
        }))
    }

    async fn create_container(
        &self,
        name: &str,
        options: ContainerOptions,
    ) -> StokerResult<Arc<dyn Container>> {
        let config = Config::<String> {
            image: Some(options.image),
            cmd: Some(options.args),
            labels: Some(options.labels),
            host_config: Some(HostConfig {
                privileged: Some(options.privileged),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.to_string(),
                    ..Default::default()
                }),
                config,
            )
            .await
            .map_err(runtime_error)?;

        tracing::info!(name, id = %created.id, "created container");
        Ok(Arc::new(DockerContainer {
            docker: self.docker.clone(),
            id: created.id,
        }))
    }
}

/// Image handle; Docker images are addressed by reference only.
struct DockerImage {
    name: String,
}

impl Image for DockerImage {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Container handle addressed by daemon-assigned id.
#[derive(Debug)]
struct DockerContainer {
    docker: Docker,
    id: String,
}

#[async_trait]
impl Container for DockerContainer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn image(&self) -> StokerResult<Arc<dyn Image>> {
        let inspect = self
            .docker
            .inspect_container(&self.id, None::<InspectContainerOptions>)
            .await
            .map_err(runtime_error)?;
        let name = inspect
            .config
            .and_then(|config| config.image)
            .ok_or_else(|| StokerError::Runtime {
                reason: format!("container {} has no image reference", self.id),
            })?;
        Ok(Arc::new(DockerImage { name }))
    }

    async fn spec(&self) -> StokerResult<Spec> {
        let inspect = self
            .docker
            .inspect_container(&self.id, None::<InspectContainerOptions>)
            .await
            .map_err(runtime_error)?;

        // Docker splits argv across entrypoint and cmd; the OCI process args
        // are their concatenation.
        let mut args = Vec::new();
        if let Some(config) = inspect.config {
            if let Some(entrypoint) = config.entrypoint {
                args.extend(entrypoint);
            }
            if let Some(cmd) = config.cmd {
                args.extend(cmd);
            }
        }

        let process = ProcessBuilder::default()
            .args(args)
            .build()
            .map_err(|err| StokerError::Runtime {
                reason: err.to_string(),
            })?;
        SpecBuilder::default()
            .process(process)
            .build()
            .map_err(|err| StokerError::Runtime {
                reason: err.to_string(),
            })
    }

    async fn task(&self) -> StokerResult<Arc<dyn Task>> {
        let inspect = self
            .docker
            .inspect_container(&self.id, None::<InspectContainerOptions>)
            .await
            .map_err(runtime_error)?;

        let status = inspect.state.and_then(|state| state.status);
        match status {
            None | Some(ContainerStateStatusEnum::EMPTY | ContainerStateStatusEnum::CREATED) => {
                Err(StokerError::TaskNotFound {
                    container: self.id.clone(),
                })
            }
            Some(_) => Ok(Arc::new(DockerTask {
                docker: self.docker.clone(),
                container_id: self.id.clone(),
            })),
        }
    }

    async fn new_task(&self) -> StokerResult<Arc<dyn Task>> {
        // Task creation is implicit in Docker; starting the task starts the
        // container process.
        Ok(Arc::new(DockerTask {
            docker: self.docker.clone(),
            container_id: self.id.clone(),
        }))
    }

    async fn delete(&self) -> StokerResult<()> {
        match self
            .docker
            .remove_container(
                &self.id,
                Some(RemoveContainerOptions {
                    force: false,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => Ok(()),
            // Task deletion removes the container with it.
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(runtime_error(err)),
        }
    }
}

/// Task handle; operates on the same container as its parent handle.
struct DockerTask {
    docker: Docker,
    container_id: String,
}

#[async_trait]
impl Task for DockerTask {
    async fn start(&self) -> StokerResult<()> {
        self.docker
            .start_container(&self.container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(runtime_error)
    }

    async fn status(&self) -> StokerResult<TaskStatus> {
        let inspect = self
            .docker
            .inspect_container(&self.container_id, None::<InspectContainerOptions>)
            .await
            .map_err(runtime_error)?;

        let status = match inspect.state.and_then(|state| state.status) {
            Some(ContainerStateStatusEnum::CREATED) => TaskStatus::Created,
            Some(
                ContainerStateStatusEnum::RUNNING | ContainerStateStatusEnum::RESTARTING,
            ) => TaskStatus::Running,
            Some(ContainerStateStatusEnum::PAUSED) => TaskStatus::Paused,
            Some(
                ContainerStateStatusEnum::EXITED
                | ContainerStateStatusEnum::DEAD
                | ContainerStateStatusEnum::REMOVING,
            ) => TaskStatus::Stopped,
            _ => TaskStatus::Unknown,
        };
        Ok(status)
    }

    async fn kill(&self, signal: Signal) -> StokerResult<()> {
        tracing::debug!(container = %self.container_id, %signal, "signalling task");
        self.docker
            .kill_container(
                &self.container_id,
                Some(KillContainerOptions {
                    signal: signal.as_str().to_string(),
                }),
            )
            .await
            .map_err(runtime_error)
    }

    async fn wait(&self) -> StokerResult<oneshot::Receiver<ExitStatus>> {
        let (tx, rx) = oneshot::channel();
        let docker = self.docker.clone();
        let container_id = self.container_id.clone();

        tokio::spawn(async move {
            let options = WaitContainerOptions {
                condition: "not-running".to_string(),
            };
            let mut stream = docker.wait_container(&container_id, Some(options));
            match stream.next().await {
                Some(Ok(response)) => {
                    let _ = tx.send(ExitStatus::new(response.status_code));
                }
                Some(Err(err)) => {
                    // Dropping the sender closes the channel; the waiter
                    // treats a closed channel as the task being gone.
                    tracing::debug!(container = %container_id, error = %err, "wait stream error");
                }
                None => {}
            }
        });

        Ok(rx)
    }

    async fn delete(&self) -> StokerResult<()> {
        self.docker
            .remove_container(
                &self.container_id,
                Some(RemoveContainerOptions {
                    force: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(runtime_error)
    }
}
