//! Container runtime client boundary.
//!
//! The lifecycle controller consumes the runtime daemon only through the
//! narrow capability traits defined here, so tests substitute fakes and the
//! real backend stays swappable.

mod client;
pub mod docker;

pub use client::{
    Container, ContainerOptions, ExitStatus, Image, RegistryAuth, RuntimeClient, Signal, Task,
    TaskStatus,
};
pub use docker::DockerRuntime;
