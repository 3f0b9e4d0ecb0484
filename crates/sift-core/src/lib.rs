//! # sift-core
//!
//! Core abstractions for the Sift data conditioning pipeline.
//!
//! This crate provides the foundational types and traits used across all Sift
//! components:
//!
//! - **Storage Gateway**: The two-phase object storage contract and its
//!   in-memory and local-filesystem backends
//! - **Namespace Layout**: The raw/conditioned landing path conventions
//! - **Identifiers**: Strongly-typed, run-scoped identifiers
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialization and span constructors
//!
//! ## Crate Boundary
//!
//! `sift-core` is the **only** crate allowed to define shared primitives.
//! The conditioning pipeline consumes storage exclusively through the
//! [`storage::StorageBackend`] contract defined here, so any backend that
//! satisfies the contract can stand in for the remote object namespace.
//!
//! ## Example
//!
//! ```rust
//! use sift_core::prelude::*;
//!
//! // Generate a run-scoped identifier
//! let run_id = RunId::generate();
//!
//! // Describe the landing layout
//! let paths = PipelinePaths::new("demo-metrics", "raw", "conditioned").unwrap();
//! assert_eq!(paths.raw("m.parquet").unwrap(), "demo-metrics/raw/m.parquet");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod local;
pub mod observability;
pub mod pipeline_paths;
pub mod storage;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use sift_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::RunId;
    pub use crate::local::LocalBackend;
    pub use crate::pipeline_paths::PipelinePaths;
    pub use crate::storage::{MemoryBackend, ObjectMeta, StorageBackend, WriteHandle};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use id::RunId;
pub use local::LocalBackend;
pub use observability::{init_logging, LogFormat};
pub use pipeline_paths::PipelinePaths;
pub use storage::{MemoryBackend, ObjectMeta, StorageBackend, WriteHandle};
