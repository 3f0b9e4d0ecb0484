//! Static pipeline configuration.
//!
//! Everything here is supplied once at startup and never re-read per run: the
//! transform rule set, the staging capacity bound, and the landing layout.

use serde::{Deserialize, Serialize};

use crate::transform::ColumnRule;

/// One declared transform: a field name and the rule that replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Field name the rule applies to (matched case-insensitively).
    pub field: String,
    /// Replacement rule for that field.
    #[serde(flatten)]
    pub rule: ColumnRule,
}

/// Configuration for a [`Conditioner`](crate::pipeline::Conditioner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionerConfig {
    /// The static transform rule set.
    pub rules: Vec<RuleSpec>,
    /// Upper bound on the raw file size a run will stage in memory.
    pub max_staging_bytes: u64,
    /// Filesystem namespace holding both landing directories.
    pub filesystem: String,
    /// Directory newly arrived files land in.
    pub raw_dir: String,
    /// Directory conditioned output is published to.
    pub conditioned_dir: String,
}

impl Default for ConditionerConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            max_staging_bytes: 64 * 1024 * 1024,
            filesystem: "demo-metrics".to_string(),
            raw_dir: "raw".to_string(),
            conditioned_dir: "conditioned".to_string(),
        }
    }
}

impl ConditionerConfig {
    /// Loads a configuration from a JSON document. Missing fields take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserialization error for malformed JSON or
    /// unknown rule types.
    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// The demonstration configuration: replace the `body` column with the
    /// Int64 sequence `[1, 2, 3, 4]`.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            rules: vec![RuleSpec {
                field: "body".to_string(),
                rule: ColumnRule::Int64Sequence {
                    values: vec![1, 2, 3, 4],
                },
            }],
            ..Self::default()
        }
    }
}
