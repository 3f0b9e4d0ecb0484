//! Parquet encoding/decoding that preserves row-group structure.
//!
//! The conditioning pipeline round-trips whole files: decode produces one
//! `RecordBatch` per Parquet row group in file order, and encode writes one
//! row group back per batch. Field order, types, row grouping, and column
//! contents survive the trip bit-for-bit wherever no transform touches them.
//!
//! `RecordBatch` carries the two structural invariants the pipeline relies
//! on — every column in a group has the group's row count, and every column
//! matches its field's declared type — so a decoded file is well-formed by
//! construction and encode only needs to re-check cross-group schema
//! agreement.

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::error::{ConditionError, Result};

/// A decoded columnar file: its schema and its row groups, in file order.
#[derive(Debug, Clone)]
pub struct ColumnarFile {
    /// Field declarations, in file order.
    pub schema: SchemaRef,
    /// One batch per row group. Every batch shares `schema`.
    pub groups: Vec<RecordBatch>,
}

impl ColumnarFile {
    /// Total row count across all groups.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.groups.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Decodes a Parquet payload into its schema and row groups.
///
/// # Errors
///
/// Returns `ConditionError::Format` if the payload is not a well-formed
/// Parquet file or a row group is truncated or otherwise unreadable.
pub fn decode(bytes: &Bytes) -> Result<ColumnarFile> {
    let probe = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
        .map_err(|e| ConditionError::format(format!("parquet reader init failed: {e}")))?;
    let schema = probe.schema().clone();

    let mut row_counts = Vec::with_capacity(probe.metadata().num_row_groups());
    for group in probe.metadata().row_groups() {
        let rows = usize::try_from(group.num_rows()).map_err(|_| {
            ConditionError::format(format!("negative row count in row group: {}", group.num_rows()))
        })?;
        row_counts.push(rows);
    }
    drop(probe);

    // One reader per group keeps the group boundary: the batch produced here
    // is exactly the rows of group `index`, nothing merged across groups.
    let mut groups = Vec::with_capacity(row_counts.len());
    for (index, rows) in row_counts.into_iter().enumerate() {
        let reader = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
            .map_err(|e| ConditionError::format(format!("parquet reader init failed: {e}")))?
            .with_row_groups(vec![index])
            .with_batch_size(rows.max(1))
            .build()
            .map_err(|e| {
                ConditionError::format(format!("row group {index} reader build failed: {e}"))
            })?;

        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ConditionError::format(format!("row group {index} read failed: {e}")))?;
        let batch = concat_batches(&schema, &batches).map_err(|e| {
            ConditionError::format(format!("row group {index} reassembly failed: {e}"))
        })?;
        groups.push(batch);
    }

    Ok(ColumnarFile { schema, groups })
}

/// Encodes a columnar file back to Parquet bytes, one row group per batch.
///
/// # Errors
///
/// Returns `ConditionError::SchemaMismatch` if any group's schema disagrees
/// with the file schema, or `ConditionError::Format` if the Parquet write
/// itself fails.
pub fn encode(file: &ColumnarFile) -> Result<Bytes> {
    for (index, batch) in file.groups.iter().enumerate() {
        if batch.schema().as_ref() != file.schema.as_ref() {
            return Err(ConditionError::schema_mismatch(format!(
                "row group {index} does not match the file schema"
            )));
        }
    }

    let mut out = Vec::new();
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(&mut out, file.schema.clone(), Some(props))
        .map_err(|e| ConditionError::format(format!("parquet writer init failed: {e}")))?;

    for batch in &file.groups {
        writer
            .write(batch)
            .map_err(|e| ConditionError::format(format!("parquet write failed: {e}")))?;
        // Explicit flush closes the current row group, so the output's group
        // boundaries are exactly the input's.
        writer
            .flush()
            .map_err(|e| ConditionError::format(format!("parquet flush failed: {e}")))?;
    }

    writer
        .close()
        .map_err(|e| ConditionError::format(format!("parquet close failed: {e}")))?;
    Ok(Bytes::from(out))
}
