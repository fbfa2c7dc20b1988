//! Common error types for the Stoker engine lifecycle manager.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`StokerError`].
pub type StokerResult<T> = Result<T, StokerError>;

/// Errors surfaced by the engine lifecycle controller and the runtime
/// client boundary.
///
/// The variants form a closed set compared by kind: callers match on the
/// variant rather than on message text. Wrapping variants carry the cause
/// text in their display string so operators see both the fixed context and
/// the underlying failure.
#[derive(Error, Diagnostic, Debug)]
pub enum StokerError {
    /// An engine container already exists.
    #[error("engine already present")]
    #[diagnostic(
        code(stoker::engine::already_present),
        help("remove the existing engine before initializing a new one")
    )]
    EngineAlreadyPresent,

    /// No engine container exists.
    #[error("engine not present")]
    #[diagnostic(code(stoker::engine::not_present))]
    EngineNotPresent,

    /// The engine task did not exit within the shutdown timeout.
    #[error("timeout waiting for engine to exit")]
    #[diagnostic(code(stoker::engine::shutdown_timeout))]
    EngineShutdownTimeout,

    /// A `--config-file` flag was present in the launch arguments but had
    /// no value.
    #[error("malformed --config-file param in engine arguments")]
    #[diagnostic(code(stoker::engine::malformed_config_file_param))]
    MalformedConfigFileParam,

    /// The launch arguments carried no `--config-file` flag.
    #[error("unable to determine the engine config file location")]
    #[diagnostic(code(stoker::engine::config_lookup))]
    EngineConfigLookup,

    /// The engine container never appeared before the wait deadline.
    #[error("timeout waiting for engine to appear")]
    #[diagnostic(code(stoker::engine::wait_timeout))]
    EngineWaitTimeout,

    /// The engine container exists but never answered a health check before
    /// the wait deadline.
    #[error("engine present but ping failed: {reason}")]
    #[diagnostic(
        code(stoker::engine::ping),
        help("the engine is scheduled but not serving yet; inspect its logs")
    )]
    EnginePing {
        /// The last health-check failure.
        reason: String,
    },

    /// Image not found in the local store.
    #[error("image not found: {reference}")]
    #[diagnostic(code(stoker::image::not_found))]
    ImageNotFound {
        /// The image reference that was not found.
        reference: String,
    },

    /// The engine image vanished between pull and container creation.
    #[error("engine image missing: {reference}")]
    #[diagnostic(code(stoker::image::missing))]
    EngineImageMissing {
        /// The image reference expected to be present.
        reference: String,
    },

    /// The container has no task.
    #[error("no task found for container {container}")]
    #[diagnostic(code(stoker::task::not_found))]
    TaskNotFound {
        /// The container whose task lookup came up empty.
        container: String,
    },

    /// Listing containers failed.
    #[error("unable to list containers: {reason}")]
    #[diagnostic(code(stoker::container::list))]
    ContainerList {
        /// The underlying list failure.
        reason: String,
    },

    /// Checking for a local image failed with something other than
    /// "not found".
    #[error("unable to check for image '{reference}': {reason}")]
    #[diagnostic(code(stoker::image::check))]
    ImageCheck {
        /// The image reference being checked.
        reference: String,
        /// The underlying check failure.
        reason: String,
    },

    /// Pulling an image failed.
    #[error("unable to pull image '{reference}': {reason}")]
    #[diagnostic(code(stoker::image::pull))]
    ImagePull {
        /// The image reference being pulled.
        reference: String,
        /// The underlying pull failure.
        reason: String,
    },

    /// Creating and starting the engine container failed.
    #[error("failed to create docker daemon: {reason}")]
    #[diagnostic(code(stoker::engine::create))]
    EngineCreate {
        /// The underlying create or start failure.
        reason: String,
    },

    /// Removing the engine container failed.
    #[error("failed to remove existing engine: {reason}")]
    #[diagnostic(code(stoker::engine::remove))]
    EngineRemoval {
        /// The underlying delete failure.
        reason: String,
    },

    /// An uncategorized runtime client failure.
    #[error("container runtime error: {reason}")]
    #[diagnostic(code(stoker::runtime))]
    Runtime {
        /// The underlying runtime failure.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(stoker::io))]
    Io(#[from] std::io::Error),
}
