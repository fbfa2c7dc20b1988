//! The engine lifecycle controller.

use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use stoker_common::{StokerError, StokerResult};

use crate::runtime::{
    Container, ContainerOptions, Image as _, RegistryAuth, RuntimeClient, Signal, Task as _,
    TaskStatus,
};

use super::options::{EngineInitOptions, EngineTiming};
use super::{ENGINE_CONTAINER_NAME, ENGINE_LABEL};

/// Drives the engine container through its lifecycle.
///
/// The controller holds no state of its own beyond configuration; the
/// runtime daemon is the source of truth, and it enforces the "at most one
/// engine" invariant through the well-known container name. Operations are
/// caller-serialized: do not run `init_engine` concurrently with
/// `remove_engine`.
pub struct EngineController {
    runtime: Arc<dyn RuntimeClient>,
    timing: EngineTiming,
}

impl EngineController {
    /// Create a controller over the given runtime client.
    pub fn new(runtime: Arc<dyn RuntimeClient>) -> Self {
        Self {
            runtime,
            timing: EngineTiming::default(),
        }
    }

    /// Replace the controller's timing configuration.
    #[must_use]
    pub fn with_timing(mut self, timing: EngineTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Look up the engine container.
    ///
    /// Fails with [`StokerError::EngineNotPresent`] when no container with
    /// the well-known engine name exists.
    pub async fn get_engine(&self) -> StokerResult<Arc<dyn Container>> {
        let containers = self
            .runtime
            .containers(ENGINE_CONTAINER_NAME)
            .await
            .map_err(|err| StokerError::ContainerList {
                reason: err.to_string(),
            })?;

        containers
            .into_iter()
            .next()
            .ok_or(StokerError::EngineNotPresent)
    }

    /// Initialize a new engine: pull the image if missing, create and start
    /// the container, then wait until `health` reports it serving.
    ///
    /// Fails with [`StokerError::EngineAlreadyPresent`], without touching
    /// anything, when an engine container already exists. Each subsequent
    /// step fails fast; nothing is retried except the bounded health poll.
    pub async fn init_engine<W, F, Fut>(
        &self,
        opts: &EngineInitOptions,
        out: &mut W,
        auth: Option<&RegistryAuth>,
        health: F,
    ) -> StokerResult<()>
    where
        W: Write + Send,
        F: Fn() -> Fut + Send,
        Fut: Future<Output = StokerResult<()>> + Send,
    {
        match self.get_engine().await {
            Ok(_) => return Err(StokerError::EngineAlreadyPresent),
            Err(StokerError::EngineNotPresent) => {}
            Err(err) => return Err(err),
        }

        let reference = opts.resolve_image();
        match self.runtime.get_image(&reference).await {
            Ok(_) => {
                tracing::debug!(%reference, "image already present");
            }
            Err(StokerError::ImageNotFound { .. }) => {
                writeln!(out, "pulling {reference}...")?;
                self.runtime
                    .pull_image(&reference, auth)
                    .await
                    .map_err(|err| StokerError::ImagePull {
                        reference: reference.clone(),
                        reason: err.to_string(),
                    })?;
                writeln!(out, "pulled {reference}")?;
            }
            Err(err) => {
                return Err(StokerError::ImageCheck {
                    reference,
                    reason: err.to_string(),
                });
            }
        }

        self.start_engine(&reference, &opts.config_file, out)
            .await
            .map_err(|err| StokerError::EngineCreate {
                reason: err.to_string(),
            })?;

        self.wait_for_engine(out, health).await
    }

    /// Create the engine container and start its task.
    ///
    /// Lower-level primitive behind [`init_engine`]; expects the image to
    /// already be present and does not wait for health.
    ///
    /// [`init_engine`]: Self::init_engine
    pub async fn start_engine<W>(
        &self,
        reference: &str,
        config_file: &str,
        out: &mut W,
    ) -> StokerResult<()>
    where
        W: Write + Send,
    {
        let image = match self.runtime.get_image(reference).await {
            Ok(image) => image,
            Err(StokerError::ImageNotFound { .. }) => {
                return Err(StokerError::EngineImageMissing {
                    reference: reference.to_string(),
                });
            }
            Err(err) => return Err(err),
        };

        let mut labels = HashMap::new();
        labels.insert(ENGINE_LABEL.to_string(), "true".to_string());
        let options = ContainerOptions {
            image: image.name().to_string(),
            args: vec![
                ENGINE_CONTAINER_NAME.to_string(),
                "--config-file".to_string(),
                config_file.to_string(),
            ],
            labels,
            privileged: true,
        };

        writeln!(out, "starting engine container {ENGINE_CONTAINER_NAME}")?;
        let container = self
            .runtime
            .create_container(ENGINE_CONTAINER_NAME, options)
            .await?;
        let task = container.new_task().await?;
        task.start().await?;
        tracing::info!(container = container.id(), "engine task started");
        Ok(())
    }

    /// The name of the image the engine container runs.
    pub async fn engine_image(&self, engine: &dyn Container) -> StokerResult<String> {
        let image = engine.image().await?;
        Ok(image.name().to_string())
    }

    /// Poll until the engine is up and `health` succeeds.
    ///
    /// Both "container not yet schedulable" and "running but not yet
    /// serving" are transient here and share the same deadline, but the
    /// terminal errors differ so operators can tell them apart:
    /// [`StokerError::EngineWaitTimeout`] when the container never showed
    /// up, [`StokerError::EnginePing`] when it did but kept failing the
    /// health check.
    pub async fn wait_for_engine<W, F, Fut>(&self, out: &mut W, health: F) -> StokerResult<()>
    where
        W: Write + Send,
        F: Fn() -> Fut + Send,
        Fut: Future<Output = StokerResult<()>> + Send,
    {
        write!(out, "waiting for engine to be responsive... ")?;
        out.flush()?;

        let deadline = tokio::time::Instant::now() + self.timing.wait_timeout;
        let mut engine_seen = false;
        let mut last_ping_error: Option<String> = None;

        loop {
            if self.get_engine().await.is_ok() {
                engine_seen = true;
                match health().await {
                    Ok(()) => {
                        writeln!(out, "engine is online")?;
                        return Ok(());
                    }
                    Err(err) => last_ping_error = Some(err.to_string()),
                }
            }

            if tokio::time::Instant::now() >= deadline {
                writeln!(out)?;
                return Err(match last_ping_error {
                    Some(reason) if engine_seen => StokerError::EnginePing { reason },
                    _ => StokerError::EngineWaitTimeout,
                });
            }
            tokio::time::sleep(self.timing.wait_interval).await;
        }
    }

    /// The engine daemon's config file path, extracted from the container's
    /// launch arguments.
    pub async fn engine_config_file_path(&self, engine: &dyn Container) -> StokerResult<String> {
        let spec = engine.spec().await?;
        config_file_from_spec(&spec)
    }

    /// Remove the engine: stop its task if running, delete the task, delete
    /// the container.
    ///
    /// A running task gets a termination signal and a bounded wait for its
    /// exit; [`StokerError::EngineShutdownTimeout`] reports a task that
    /// would not die. Every other transition failure surfaces immediately;
    /// the caller decides whether to retry the whole removal.
    pub async fn remove_engine(&self, engine: &dyn Container) -> StokerResult<()> {
        let task = match engine.task().await {
            Ok(task) => task,
            Err(StokerError::TaskNotFound { .. }) => {
                tracing::debug!(container = engine.id(), "engine has no task");
                return delete_engine_container(engine).await;
            }
            Err(err) => return Err(err),
        };

        let status = task.status().await?;
        tracing::debug!(container = engine.id(), %status, "removing engine");
        if status == TaskStatus::Running {
            task.kill(Signal::Term).await?;
            let exit = task.wait().await?;
            match tokio::time::timeout(self.timing.shutdown_timeout, exit).await {
                Ok(Ok(exit_status)) => {
                    tracing::debug!(code = exit_status.code, "engine task exited");
                }
                // Closed channel: the producer saw the task gone already.
                Ok(Err(_)) => {}
                Err(_) => return Err(StokerError::EngineShutdownTimeout),
            }
        }

        task.delete().await?;
        delete_engine_container(engine).await
    }
}

async fn delete_engine_container(engine: &dyn Container) -> StokerResult<()> {
    engine
        .delete()
        .await
        .map_err(|err| StokerError::EngineRemoval {
            reason: err.to_string(),
        })
}

/// Extract the `--config-file` value from an OCI process spec.
///
/// Accepts both `--config-file value` and `--config-file=value`. The scan
/// does not stop at the first hit, so a repeated flag resolves to its last
/// occurrence.
fn config_file_from_spec(spec: &oci_spec::runtime::Spec) -> StokerResult<String> {
    let empty = Vec::new();
    let args = spec
        .process()
        .as_ref()
        .and_then(|process| process.args().as_ref())
        .unwrap_or(&empty);

    let mut config_file = None;
    for (i, arg) in args.iter().enumerate() {
        if arg.starts_with("--config-file") {
            if let Some((_, value)) = arg.split_once('=') {
                config_file = Some(value.to_string());
            } else {
                match args.get(i + 1) {
                    Some(value) => config_file = Some(value.clone()),
                    None => return Err(StokerError::MalformedConfigFileParam),
                }
            }
        }
    }

    config_file.ok_or(StokerError::EngineConfigLookup)
}
