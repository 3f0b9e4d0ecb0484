//! Conditioning run orchestration.
//!
//! One run per triggering event: stage → decode → transform → encode →
//! publish → retire. The ordering contract is the point of this module:
//!
//! - Nothing is created or deleted in the destination namespace until the
//!   transformed payload is fully encoded in memory.
//! - Publish must fully succeed (create, append, flush) before the raw file
//!   is touched. A publish failure is fatal and leaves the raw file as the
//!   sole, intact copy.
//! - Retirement of the raw file is the single non-fatal step. Once the
//!   conditioned copy is durably flushed, a surviving raw file is a harmless
//!   duplicate, so a delete failure is logged and reported as a warning
//!   rather than failing the run.
//!
//! Runs for distinct file names are independent and may execute concurrently;
//! a run owns its staging buffer and write handle outright, both scoped by
//! its [`RunId`]. Duplicate deliveries of the same name race on the
//! destination's create-new contract and the loser fails with a conflict
//! instead of overwriting the published object.

use std::sync::Arc;

use tracing::Instrument as _;

use sift_core::observability::pipeline_span;
use sift_core::{PipelinePaths, RunId, StorageBackend};

use crate::codec::{self, ColumnarFile};
use crate::config::ConditionerConfig;
use crate::error::{ConditionError, Result};
use crate::transform::TransformSet;

/// Pipeline stage a run was in when an event occurred, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    /// Reading the raw file into the run's staging buffer.
    Stage,
    /// Decoding the staged bytes into schema and row groups.
    Decode,
    /// Applying the transform rule set to every row group.
    Transform,
    /// Encoding the transformed file back to bytes.
    Encode,
    /// Creating, appending, and flushing the conditioned object.
    Publish,
    /// Deleting the raw file after a durable publish.
    Retire,
}

impl RunStage {
    /// Short lowercase name for log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Decode => "decode",
            Self::Transform => "transform",
            Self::Encode => "encode",
            Self::Publish => "publish",
            Self::Retire => "retire",
        }
    }
}

/// Outcome of a successful conditioning run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Identifier of this run.
    pub run_id: RunId,
    /// Object path of the published conditioned file.
    pub conditioned_path: String,
    /// Bytes staged from the raw file.
    pub staged_bytes: u64,
    /// Bytes published to the conditioned file.
    pub published_bytes: u64,
    /// Number of row groups carried through the transform.
    pub row_groups: usize,
    /// Present when the raw file could not be retired. The conditioned copy
    /// is durable either way; the surviving raw file is a duplicate, not a
    /// correctness problem.
    pub retire_warning: Option<String>,
}

/// Drives one conditioning run per triggering event.
///
/// Holds only shared-immutable state (`Arc<dyn StorageBackend>`, the rule
/// set, the landing layout), so one `Conditioner` can serve any number of
/// concurrent runs.
pub struct Conditioner {
    storage: Arc<dyn StorageBackend>,
    paths: PipelinePaths,
    transforms: TransformSet,
    max_staging_bytes: u64,
}

impl Conditioner {
    /// Builds a conditioner from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the landing layout is invalid or the rule set
    /// declares duplicate fields.
    pub fn new(storage: Arc<dyn StorageBackend>, config: &ConditionerConfig) -> Result<Self> {
        let paths =
            PipelinePaths::new(&config.filesystem, &config.raw_dir, &config.conditioned_dir)?;
        let transforms = TransformSet::new(
            config
                .rules
                .iter()
                .map(|spec| (spec.field.clone(), spec.rule.clone())),
        )?;
        tracing::debug!(
            rules = transforms.len(),
            filesystem = %config.filesystem,
            "conditioner ready"
        );

        Ok(Self {
            storage,
            paths,
            transforms,
            max_staging_bytes: config.max_staging_bytes,
        })
    }

    /// Runs the pipeline for one newly arrived raw file.
    ///
    /// `file_name` is the bare object name delivered by the trigger; it is
    /// resolved against the landing layout. Triggers deliver at-least-once,
    /// so a redelivery after a successful run fails with `AlreadyExists` on
    /// the conditioned object and leaves it untouched.
    ///
    /// # Errors
    ///
    /// Every failure except raw-file retirement is fatal and surfaced to the
    /// caller; see [`ConditionError`] for the taxonomy.
    pub async fn run(&self, file_name: &str) -> Result<RunReport> {
        let run_id = RunId::generate();
        let span = pipeline_span("condition", &run_id.to_string(), file_name);
        self.run_inner(run_id, file_name).instrument(span).await
    }

    async fn run_inner(&self, run_id: RunId, file_name: &str) -> Result<RunReport> {
        let raw_path = self
            .paths
            .raw(file_name)
            .map_err(|e| fatal(RunStage::Stage, e.into()))?;
        let conditioned_path = self
            .paths
            .conditioned(file_name)
            .map_err(|e| fatal(RunStage::Stage, e.into()))?;

        // Stage. Capacity is checked against the object's reported size
        // before the buffer is filled, so an oversized file fails without
        // ever occupying staging space.
        let meta = self
            .storage
            .head(&raw_path)
            .await
            .map_err(|e| fatal(RunStage::Stage, e.into()))?
            .ok_or_else(|| {
                fatal(
                    RunStage::Stage,
                    sift_core::Error::NotFound(raw_path.clone()).into(),
                )
            })?;
        if meta.size > self.max_staging_bytes {
            return Err(fatal(
                RunStage::Stage,
                ConditionError::ResourceExhausted {
                    size: meta.size,
                    limit: self.max_staging_bytes,
                },
            ));
        }
        let staged = self
            .storage
            .get(&raw_path)
            .await
            .map_err(|e| fatal(RunStage::Stage, e.into()))?;
        let staged_bytes = staged.len() as u64;
        tracing::info!(bytes = staged_bytes, "staged raw file");

        // Decode.
        let file = codec::decode(&staged).map_err(|e| fatal(RunStage::Decode, e))?;

        // Transform every row group through the static rule set.
        let groups = file
            .groups
            .iter()
            .map(|group| self.transforms.apply(group))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| fatal(RunStage::Transform, e))?;
        let conditioned = ColumnarFile {
            schema: self.transforms.transform_schema(&file.schema),
            groups,
        };
        let row_groups = conditioned.groups.len();

        // Encode.
        let encoded = codec::encode(&conditioned).map_err(|e| fatal(RunStage::Encode, e))?;
        let published_bytes = encoded.len() as u64;

        // Publish: create, append at offset 0, flush at the final length.
        // Any failure here leaves the raw file untouched; no delete is
        // attempted.
        let handle = self
            .storage
            .create(&conditioned_path)
            .await
            .map_err(|e| fatal(RunStage::Publish, e.into()))?;
        self.storage
            .append(&handle, encoded, 0)
            .await
            .map_err(|e| fatal(RunStage::Publish, e.into()))?;
        self.storage
            .flush(&handle, published_bytes)
            .await
            .map_err(|e| fatal(RunStage::Publish, e.into()))?;
        tracing::info!(
            bytes = published_bytes,
            row_groups,
            rows = conditioned.total_rows(),
            path = %conditioned_path,
            "published conditioned file"
        );

        // Retire. The conditioned copy is durable, so a failure here only
        // warns: the surviving raw file is a duplicate, and an absent one
        // means another run already retired it.
        let retire_warning = match self.storage.delete(&raw_path).await {
            Ok(()) => None,
            Err(err) if err.is_not_found() => {
                tracing::warn!(
                    stage = RunStage::Retire.as_str(),
                    "raw file already absent at retirement"
                );
                Some(format!("raw file {raw_path} already absent at retirement"))
            }
            Err(err) => {
                tracing::warn!(
                    stage = RunStage::Retire.as_str(),
                    error = %err,
                    "unable to delete raw file; conditioned output is durable"
                );
                Some(format!("unable to delete raw file {raw_path}: {err}"))
            }
        };

        Ok(RunReport {
            run_id,
            conditioned_path,
            staged_bytes,
            published_bytes,
            row_groups,
            retire_warning,
        })
    }
}

fn fatal(stage: RunStage, err: ConditionError) -> ConditionError {
    tracing::error!(stage = stage.as_str(), error = %err, "conditioning run failed");
    err
}
