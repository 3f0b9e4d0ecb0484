//! Column-level transforms applied during conditioning.
//!
//! A [`TransformSet`] is the declared, static rule set: field name (matched
//! case-insensitively) to replacement rule. It is built once at startup and
//! never mutated; each run walks it read-only, so concurrent runs share
//! nothing mutable. Fields without a rule pass through with their original
//! column untouched.

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ConditionError, Result};

/// A deterministic replacement rule for one field's column.
///
/// Rules are total: given the group's row count they always produce a full
/// replacement column, and the same inputs always produce the same output.
/// A rule may change the field's type; the output schema follows the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnRule {
    /// Replace with this exact Int64 sequence. The sequence length must equal
    /// the row count of every group it is applied to.
    Int64Sequence {
        /// The replacement values, one per row.
        values: Vec<i64>,
    },
    /// Fill with a single Int64 value repeated to the group's row count.
    Int64Constant {
        /// The fill value.
        value: i64,
    },
    /// Fill with a single string repeated to the group's row count.
    Utf8Constant {
        /// The fill value.
        value: String,
    },
}

impl ColumnRule {
    /// The type of the column this rule produces.
    #[must_use]
    pub fn output_type(&self) -> DataType {
        match self {
            Self::Int64Sequence { .. } | Self::Int64Constant { .. } => DataType::Int64,
            Self::Utf8Constant { .. } => DataType::Utf8,
        }
    }

    /// Builds the replacement column for a group with `rows` rows.
    fn replacement(&self, field: &str, rows: usize) -> Result<ArrayRef> {
        match self {
            Self::Int64Sequence { values } => {
                if values.len() != rows {
                    return Err(ConditionError::schema_mismatch(format!(
                        "replacement for '{field}' has {} values for a {rows}-row group",
                        values.len()
                    )));
                }
                Ok(Arc::new(Int64Array::from(values.clone())))
            }
            Self::Int64Constant { value } => Ok(Arc::new(Int64Array::from(vec![*value; rows]))),
            Self::Utf8Constant { value } => {
                Ok(Arc::new(StringArray::from(vec![value.as_str(); rows])))
            }
        }
    }
}

/// The full rule set for a pipeline, keyed by case-folded field name.
#[derive(Debug, Clone, Default)]
pub struct TransformSet {
    rules: HashMap<String, ColumnRule>,
}

impl TransformSet {
    /// Builds a rule set, folding field names for case-insensitive matching.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError::SchemaMismatch` if two rules target the same
    /// field after case folding; field names are case-insensitively unique
    /// within a schema, so such a rule set can never apply cleanly.
    pub fn new(rules: impl IntoIterator<Item = (String, ColumnRule)>) -> Result<Self> {
        let mut folded = HashMap::new();
        for (field, rule) in rules {
            let key = field.to_ascii_lowercase();
            if folded.insert(key, rule).is_some() {
                return Err(ConditionError::schema_mismatch(format!(
                    "duplicate transform rule for field '{field}'"
                )));
            }
        }
        Ok(Self { rules: folded })
    }

    /// Number of declared rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if no rules are declared (every column passes through).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn rule_for(&self, field: &str) -> Option<&ColumnRule> {
        self.rules.get(&field.to_ascii_lowercase())
    }

    /// The schema the transform produces for an input schema: ruled fields
    /// take the rule's output type, everything else is unchanged, in order.
    #[must_use]
    pub fn transform_schema(&self, schema: &Schema) -> SchemaRef {
        let fields: Vec<_> = schema
            .fields()
            .iter()
            .map(|field| match self.rule_for(field.name()) {
                Some(rule) => {
                    Arc::new(field.as_ref().clone().with_data_type(rule.output_type()))
                }
                None => Arc::clone(field),
            })
            .collect();
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
    }

    /// Applies the rule set to one row group.
    ///
    /// For each field in order, a matching rule replaces the column entirely;
    /// otherwise the original column passes through with its identity intact.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError::SchemaMismatch` if a replacement column's
    /// length differs from the group's row count; the uniform-row-count
    /// invariant is enforced here, never left implicit.
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let input_schema = batch.schema();
        let rows = batch.num_rows();

        let mut columns = Vec::with_capacity(batch.num_columns());
        for (index, field) in input_schema.fields().iter().enumerate() {
            let column = match self.rule_for(field.name()) {
                Some(rule) => rule.replacement(field.name(), rows)?,
                None => Arc::clone(batch.column(index)),
            };
            columns.push(column);
        }

        RecordBatch::try_new(self.transform_schema(&input_schema), columns).map_err(|e| {
            ConditionError::schema_mismatch(format!("transformed row group is inconsistent: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, TimestampMillisecondArray};
    use arrow::datatypes::{Field, TimeUnit};

    fn event_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new(
                "timestamp",
                DataType::Timestamp(TimeUnit::Millisecond, None),
                false,
            ),
            Field::new("Body", DataType::Int64, false),
            Field::new("score", DataType::Float64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(TimestampMillisecondArray::from(vec![10, 20, 30, 40])) as ArrayRef,
                Arc::new(Int64Array::from(vec![100, 200, 300, 400])),
                Arc::new(Float64Array::from(vec![0.1, 0.2, 0.3, 0.4])),
            ],
        )
        .expect("record batch build")
    }

    fn body_rule() -> TransformSet {
        TransformSet::new(vec![(
            "body".to_string(),
            ColumnRule::Int64Sequence {
                values: vec![1, 2, 3, 4],
            },
        )])
        .expect("rule set")
    }

    #[test]
    fn replaces_matching_field_case_insensitively() {
        let batch = event_batch();
        let out = body_rule().apply(&batch).expect("apply");

        let body = out
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("int64 column");
        assert_eq!(body, &Int64Array::from(vec![1, 2, 3, 4]));
        // The field keeps its original spelling.
        assert_eq!(out.schema().field(1).name(), "Body");
    }

    #[test]
    fn untouched_columns_keep_their_identity() {
        let batch = event_batch();
        let out = body_rule().apply(&batch).expect("apply");

        assert!(Arc::ptr_eq(batch.column(0), out.column(0)));
        assert!(Arc::ptr_eq(batch.column(2), out.column(2)));
        assert_eq!(out.schema().field(0), batch.schema().field(0));
    }

    #[test]
    fn sequence_length_must_equal_row_count() {
        let rules = TransformSet::new(vec![(
            "body".to_string(),
            ColumnRule::Int64Sequence {
                values: vec![1, 2, 3],
            },
        )])
        .expect("rule set");

        let result = rules.apply(&event_batch());
        assert!(matches!(result, Err(ConditionError::SchemaMismatch { .. })));
    }

    #[test]
    fn constants_fill_to_row_count() {
        let rules = TransformSet::new(vec![(
            "score".to_string(),
            ColumnRule::Int64Constant { value: 7 },
        )])
        .expect("rule set");

        let out = rules.apply(&event_batch()).expect("apply");
        let score = out
            .column(2)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("int64 column");
        assert_eq!(score, &Int64Array::from(vec![7, 7, 7, 7]));
    }

    #[test]
    fn rule_may_change_the_field_type() {
        let rules = TransformSet::new(vec![(
            "body".to_string(),
            ColumnRule::Utf8Constant {
                value: "redacted".to_string(),
            },
        )])
        .expect("rule set");

        let batch = event_batch();
        let out = rules.apply(&batch).expect("apply");
        assert_eq!(out.schema().field(1).data_type(), &DataType::Utf8);
        assert_eq!(
            rules.transform_schema(&batch.schema()).field(1).data_type(),
            &DataType::Utf8
        );
    }

    #[test]
    fn duplicate_rules_after_folding_are_rejected() {
        let result = TransformSet::new(vec![
            (
                "Body".to_string(),
                ColumnRule::Int64Constant { value: 1 },
            ),
            (
                "body".to_string(),
                ColumnRule::Int64Constant { value: 2 },
            ),
        ]);
        assert!(matches!(result, Err(ConditionError::SchemaMismatch { .. })));
    }

    #[test]
    fn empty_rule_set_is_identity() {
        let rules = TransformSet::default();
        assert!(rules.is_empty());

        let batch = event_batch();
        let out = rules.apply(&batch).expect("apply");
        assert_eq!(out, batch);
    }
}
