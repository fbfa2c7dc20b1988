//! Closure-configured fakes for the runtime capability traits, plus the
//! engine cleanup helper shared by the lifecycle tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use oci_spec::runtime::Spec;
use stoker::engine::EngineController;
use stoker::runtime::{
    Container, ContainerOptions, ExitStatus, Image, RegistryAuth, RuntimeClient, Signal, Task,
    TaskStatus,
};
use stoker_common::{StokerError, StokerResult};
use tokio::sync::oneshot;

fn unimplemented_error(what: &str) -> StokerError {
    StokerError::Runtime {
        reason: format!("{what} not implemented"),
    }
}

type ContainersFn = dyn Fn() -> StokerResult<Vec<Arc<dyn Container>>> + Send + Sync;
type ImageFn = dyn Fn(&str) -> StokerResult<Arc<dyn Image>> + Send + Sync;
type CreateContainerFn = dyn Fn(&str, ContainerOptions) -> StokerResult<Arc<dyn Container>> + Send + Sync;

/// Fake runtime client; unset behaviors fail loudly.
#[derive(Default)]
pub struct FakeRuntime {
    pub containers_fn: Option<Box<ContainersFn>>,
    pub get_image_fn: Option<Box<ImageFn>>,
    pub pull_image_fn: Option<Box<ImageFn>>,
    pub create_container_fn: Option<Box<CreateContainerFn>>,
}

#[async_trait]
impl RuntimeClient for FakeRuntime {
    async fn containers(&self, _name_filter: &str) -> StokerResult<Vec<Arc<dyn Container>>> {
        match &self.containers_fn {
            Some(f) => f(),
            None => Err(unimplemented_error("containers")),
        }
    }

    async fn get_image(&self, reference: &str) -> StokerResult<Arc<dyn Image>> {
        match &self.get_image_fn {
            Some(f) => f(reference),
            None => Err(unimplemented_error("get_image")),
        }
    }

    async fn pull_image(
        &self,
        reference: &str,
        _auth: Option<&RegistryAuth>,
    ) -> StokerResult<Arc<dyn Image>> {
        match &self.pull_image_fn {
            Some(f) => f(reference),
            None => Err(unimplemented_error("pull_image")),
        }
    }

    async fn create_container(
        &self,
        name: &str,
        options: ContainerOptions,
    ) -> StokerResult<Arc<dyn Container>> {
        match &self.create_container_fn {
            Some(f) => f(name, options),
            None => Err(unimplemented_error("create_container")),
        }
    }
}

/// Fake image carrying only a name.
pub struct FakeImage {
    pub name: String,
}

impl FakeImage {
    pub fn named(name: &str) -> Arc<dyn Image> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

impl Image for FakeImage {
    fn name(&self) -> &str {
        &self.name
    }
}

type ImageLookupFn = dyn Fn() -> StokerResult<Arc<dyn Image>> + Send + Sync;
type SpecFn = dyn Fn() -> StokerResult<Spec> + Send + Sync;
type TaskFn = dyn Fn() -> StokerResult<Arc<dyn Task>> + Send + Sync;
type UnitFn = dyn Fn() -> StokerResult<()> + Send + Sync;
type StatusFn = dyn Fn() -> StokerResult<TaskStatus> + Send + Sync;
type WaitFn = dyn Fn() -> StokerResult<oneshot::Receiver<ExitStatus>> + Send + Sync;

/// Fake container handle.
pub struct FakeContainer {
    pub id: String,
    pub image_fn: Option<Box<ImageLookupFn>>,
    pub spec_fn: Option<Box<SpecFn>>,
    pub task_fn: Option<Box<TaskFn>>,
    pub new_task_fn: Option<Box<TaskFn>>,
    pub delete_fn: Option<Box<UnitFn>>,
}

impl std::fmt::Debug for FakeContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeContainer")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Default for FakeContainer {
    fn default() -> Self {
        Self {
            id: "fake-engine".to_string(),
            image_fn: None,
            spec_fn: None,
            task_fn: None,
            new_task_fn: None,
            delete_fn: None,
        }
    }
}

#[async_trait]
impl Container for FakeContainer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn image(&self) -> StokerResult<Arc<dyn Image>> {
        match &self.image_fn {
            Some(f) => f(),
            None => Err(unimplemented_error("image")),
        }
    }

    async fn spec(&self) -> StokerResult<Spec> {
        match &self.spec_fn {
            Some(f) => f(),
            None => Err(unimplemented_error("spec")),
        }
    }

    async fn task(&self) -> StokerResult<Arc<dyn Task>> {
        match &self.task_fn {
            Some(f) => f(),
            None => Err(StokerError::TaskNotFound {
                container: self.id.clone(),
            }),
        }
    }

    async fn new_task(&self) -> StokerResult<Arc<dyn Task>> {
        match &self.new_task_fn {
            Some(f) => f(),
            None => Err(unimplemented_error("new_task")),
        }
    }

    async fn delete(&self) -> StokerResult<()> {
        match &self.delete_fn {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

/// Fake task; unset behaviors succeed, mirroring an engine process that
/// obeys every command.
#[derive(Default)]
pub struct FakeTask {
    pub start_fn: Option<Box<UnitFn>>,
    pub status_fn: Option<Box<StatusFn>>,
    pub kill_fn: Option<Box<UnitFn>>,
    pub wait_fn: Option<Box<WaitFn>>,
    pub delete_fn: Option<Box<UnitFn>>,
}

#[async_trait]
impl Task for FakeTask {
    async fn start(&self) -> StokerResult<()> {
        match &self.start_fn {
            Some(f) => f(),
            None => Ok(()),
        }
    }

    async fn status(&self) -> StokerResult<TaskStatus> {
        match &self.status_fn {
            Some(f) => f(),
            None => Ok(TaskStatus::Unknown),
        }
    }

    async fn kill(&self, _signal: Signal) -> StokerResult<()> {
        match &self.kill_fn {
            Some(f) => f(),
            None => Ok(()),
        }
    }

    async fn wait(&self) -> StokerResult<oneshot::Receiver<ExitStatus>> {
        match &self.wait_fn {
            Some(f) => f(),
            None => {
                let (tx, rx) = oneshot::channel();
                let _ = tx.send(ExitStatus::new(0));
                Ok(rx)
            }
        }
    }

    async fn delete(&self) -> StokerResult<()> {
        match &self.delete_fn {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

/// Remove any engine left behind by a previous test case.
///
/// "Not present" is success; removal failures are logged and handed back to
/// the caller.
pub async fn cleanup_engine(controller: &EngineController) -> StokerResult<()> {
    let engine = match controller.get_engine().await {
        Ok(engine) => engine,
        Err(StokerError::EngineNotPresent) => {
            tracing::debug!("engine was not detected, no cleanup to perform");
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    if let Err(err) = controller.remove_engine(engine.as_ref()).await {
        tracing::warn!(error = %err, "failed to remove engine");
        return Err(err);
    }
    Ok(())
}
