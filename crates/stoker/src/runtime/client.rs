//! Capability traits for the container runtime daemon.
//!
//! These traits are the only surface the engine controller touches:
//! list/inspect/pull for images and containers, create/signal/wait/delete
//! for tasks. Keep them narrow: everything here must stay implementable by
//! an in-memory fake.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use oci_spec::runtime::Spec;
use serde::{Deserialize, Serialize};
use stoker_common::StokerResult;
use tokio::sync::oneshot;

/// Status of a container's task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Status could not be determined.
    Unknown,
    /// Task created but not started.
    Created,
    /// Task is running.
    Running,
    /// Task has stopped.
    Stopped,
    /// Task is paused.
    Paused,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Signal delivered to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGTERM (graceful shutdown).
    Term,
    /// SIGKILL (force kill).
    Kill,
    /// SIGHUP (reload).
    Hup,
    /// SIGINT (interrupt).
    Int,
}

impl Signal {
    /// Name understood by runtime daemons (`SIGTERM`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Term => "SIGTERM",
            Self::Kill => "SIGKILL",
            Self::Hup => "SIGHUP",
            Self::Int => "SIGINT",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exit report delivered once a task terminates.
#[derive(Debug, Clone)]
pub struct ExitStatus {
    /// Process exit code.
    pub code: i64,
    /// When the task exited.
    pub exited_at: DateTime<Utc>,
}

impl ExitStatus {
    /// Build an exit report stamped with the current time.
    #[must_use]
    pub fn new(code: i64) -> Self {
        Self {
            code,
            exited_at: Utc::now(),
        }
    }
}

/// Registry credentials passed through to image pulls.
///
/// Validation is the registry's problem; this is an opaque pass-through
/// value encoded into the runtime daemon's auth header shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryAuth {
    /// Username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password or personal access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Identity token (OAuth).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_token: Option<String>,
    /// Registry server address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_address: Option<String>,
}

impl RegistryAuth {
    /// Create basic-auth credentials.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            identity_token: None,
            server_address: None,
        }
    }

    /// Encode as the base64 JSON header value runtime daemons expect.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        BASE64.encode(json)
    }
}

/// Creation parameters for the engine container.
#[derive(Debug, Clone, Default)]
pub struct ContainerOptions {
    /// Image reference to run.
    pub image: String,
    /// Full process launch arguments, binary included.
    pub args: Vec<String>,
    /// Labels to attach to the container.
    pub labels: HashMap<String, String>,
    /// Whether the container needs elevated privileges.
    pub privileged: bool,
}

/// An image known to the runtime daemon.
pub trait Image: Send + Sync {
    /// The image's reference name.
    fn name(&self) -> &str;
}

/// A task: the running process bound to a container.
#[async_trait]
pub trait Task: Send + Sync {
    /// Start the task.
    async fn start(&self) -> StokerResult<()>;

    /// Query the task's current status.
    async fn status(&self) -> StokerResult<TaskStatus>;

    /// Deliver a signal to the task.
    async fn kill(&self, signal: Signal) -> StokerResult<()>;

    /// Subscribe to the task's exit event.
    ///
    /// The receiver resolves once the task terminates. A closed channel
    /// means the producer observed the task gone, which callers treat as an
    /// exit.
    async fn wait(&self) -> StokerResult<oneshot::Receiver<ExitStatus>>;

    /// Delete the task, releasing its runtime resources.
    async fn delete(&self) -> StokerResult<()>;
}

/// A container handle.
#[async_trait]
pub trait Container: std::fmt::Debug + Send + Sync {
    /// The container's identifier.
    fn id(&self) -> &str;

    /// The image the container was created from.
    async fn image(&self) -> StokerResult<Arc<dyn Image>>;

    /// The container's OCI runtime spec.
    async fn spec(&self) -> StokerResult<Spec>;

    /// The container's current task.
    ///
    /// Fails with [`StokerError::TaskNotFound`] when the container has
    /// never been started.
    ///
    /// [`StokerError::TaskNotFound`]: stoker_common::StokerError::TaskNotFound
    async fn task(&self) -> StokerResult<Arc<dyn Task>>;

    /// Create a new task for the container without starting it.
    async fn new_task(&self) -> StokerResult<Arc<dyn Task>>;

    /// Delete the container.
    async fn delete(&self) -> StokerResult<()>;
}

/// The runtime daemon capability surface consumed by the controller.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// List containers whose name matches `name_filter`.
    async fn containers(&self, name_filter: &str) -> StokerResult<Vec<Arc<dyn Container>>>;

    /// Look up an image in the daemon's local store.
    ///
    /// Fails with [`StokerError::ImageNotFound`] when absent.
    ///
    /// [`StokerError::ImageNotFound`]: stoker_common::StokerError::ImageNotFound
    async fn get_image(&self, reference: &str) -> StokerResult<Arc<dyn Image>>;

    /// Pull an image, optionally authenticated.
    async fn pull_image(
        &self,
        reference: &str,
        auth: Option<&RegistryAuth>,
    ) -> StokerResult<Arc<dyn Image>>;

    /// Create a container.
    async fn create_container(
        &self,
        name: &str,
        options: ContainerOptions,
    ) -> StokerResult<Arc<dyn Container>>;
}
