//! Engine initialization options and controller timing.

use std::time::Duration;

/// Default registry prefix for engine images.
pub const DEFAULT_REGISTRY_PREFIX: &str = "docker.io/docker";

/// Default engine image name (the community engine).
pub const COMMUNITY_ENGINE_IMAGE: &str = "engine-community";

/// Options for initializing a new engine.
#[derive(Debug, Clone)]
pub struct EngineInitOptions {
    /// Engine version to run (the image tag).
    pub engine_version: String,
    /// Registry prefix the image is pulled from.
    pub registry_prefix: String,
    /// Engine image name within the registry.
    pub engine_image: String,
    /// Config file path handed to the engine daemon.
    pub config_file: String,
}

impl EngineInitOptions {
    /// Create options for the given version and config file, with the
    /// community image defaults.
    pub fn new(engine_version: impl Into<String>, config_file: impl Into<String>) -> Self {
        Self {
            engine_version: engine_version.into(),
            registry_prefix: DEFAULT_REGISTRY_PREFIX.to_string(),
            engine_image: COMMUNITY_ENGINE_IMAGE.to_string(),
            config_file: config_file.into(),
        }
    }

    /// Override the registry prefix.
    #[must_use]
    pub fn with_registry_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.registry_prefix = prefix.into();
        self
    }

    /// Override the engine image name.
    #[must_use]
    pub fn with_engine_image(mut self, image: impl Into<String>) -> Self {
        self.engine_image = image.into();
        self
    }

    /// The fully qualified image reference for these options.
    #[must_use]
    pub fn resolve_image(&self) -> String {
        format!(
            "{}/{}:{}",
            self.registry_prefix, self.engine_image, self.engine_version
        )
    }
}

/// Timing knobs for the controller's two suspension points.
///
/// Explicit configuration rather than ambient globals, so tests shrink the
/// waits to milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct EngineTiming {
    /// Interval between health-wait polls.
    pub wait_interval: Duration,
    /// Deadline for the engine to come up healthy.
    pub wait_timeout: Duration,
    /// Bound on waiting for a killed engine task to exit.
    pub shutdown_timeout: Duration,
}

impl Default for EngineTiming {
    fn default() -> Self {
        Self {
            wait_interval: Duration::from_millis(500),
            wait_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(60),
        }
    }
}

impl EngineTiming {
    /// Set the health poll interval.
    #[must_use]
    pub const fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    /// Set the health deadline.
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Set the shutdown wait bound.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}
