//! # stoker
//!
//! Lifecycle manager for a single long-running containerized Docker engine.
//!
//! Stoker drives a container runtime daemon's API to locate, pull, create,
//! start, health-check, and tear down the well-known engine container. The
//! runtime is consumed only through the narrow capability traits in
//! [`runtime`], so a test double can stand in for the real daemon; the
//! [`engine`] module holds the lifecycle controller built on top of that
//! boundary.

pub mod cli;
pub mod engine;
pub mod runtime;

pub use engine::{EngineController, EngineInitOptions, EngineTiming, ENGINE_CONTAINER_NAME};
pub use runtime::{Container, Image, RuntimeClient, Task};
