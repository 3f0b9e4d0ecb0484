//! # sift-conditioner
//!
//! The Sift conditioning pipeline: take a newly-arrived columnar file from
//! the raw landing directory, apply the declared column transforms, publish
//! the result to the conditioned directory, then retire the original.
//!
//! The crate is organized around four pieces:
//!
//! - [`codec`]: Parquet decode/encode that preserves row-group boundaries
//! - [`transform`]: the static, case-insensitive column rule set
//! - [`config`]: startup configuration (rules, capacity, landing layout)
//! - [`pipeline`]: the per-run orchestrator with its publish-before-retire
//!   ordering guarantee
//!
//! Storage is consumed exclusively through `sift_core::StorageBackend`; the
//! pipeline never names a concrete client, so any backend satisfying the
//! gateway contract can serve it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sift_conditioner::{Conditioner, ConditionerConfig};
//! use sift_core::MemoryBackend;
//!
//! # async fn example() -> sift_conditioner::Result<()> {
//! let storage = Arc::new(MemoryBackend::new());
//! let conditioner = Conditioner::new(storage, &ConditionerConfig::demo())?;
//! let report = conditioner.run("metrics.parquet").await?;
//! println!("published {}", report.conditioned_path);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod transform;

// Re-export key types at crate root for ergonomics
pub use codec::ColumnarFile;
pub use config::{ConditionerConfig, RuleSpec};
pub use error::{ConditionError, Result};
pub use pipeline::{Conditioner, RunReport, RunStage};
pub use transform::{ColumnRule, TransformSet};
