//! # stoker-common
//!
//! Shared types for the Stoker engine lifecycle manager.
//!
//! This crate provides the common error taxonomy used across the Stoker
//! crates: a closed set of tagged error variants that callers compare by
//! kind with `matches!`, plus the shared result alias.

#![warn(missing_docs)]

pub mod error;

pub use error::{StokerError, StokerResult};
