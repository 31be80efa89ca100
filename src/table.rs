//! Apache Arrow/Parquet plumbing shared by the on-disk tables
//!
//! Both the decade-aggregated tables and the bucket tables are flat Parquet
//! files with a handful of columns. Readers are lenient about physical types:
//! every column is cast to the type we work with, so that tables written by
//! other tools (e.g. with 64-bit signed integers or large strings) can still
//! be read, as long as no value is lost along the way.

use crate::{Error, Result};
use arrow::{
    array::{Array, ArrayRef, AsArray, PrimitiveArray, StringArray},
    compute::cast,
    datatypes::{ArrowPrimitiveType, DataType},
    record_batch::RecordBatch,
};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use std::{fs::File, path::Path};

/// Number of rows per record batch when writing tables
pub const BATCH_ROWS: usize = 64 * 1024;

/// Parquet writer settings used for every table we produce
pub fn writer_properties() -> Result<WriterProperties> {
    Ok(WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(1)?))
        .build())
}

/// Write record batches into a Parquet file, then flush and close it
pub fn write_batches(
    file: &File,
    schema: arrow::datatypes::SchemaRef,
    batches: impl IntoIterator<Item = Result<RecordBatch>>,
) -> Result<()> {
    let mut writer = ArrowWriter::try_new(file.try_clone()?, schema, Some(writer_properties()?))?;
    for batch in batches {
        writer.write(&batch?)?;
    }
    writer.close()?;
    file.sync_all()?;
    Ok(())
}

/// Read all record batches of a Parquet file, in order
pub fn for_each_batch(path: &Path, mut visit: impl FnMut(&RecordBatch) -> Result<()>) -> Result<()> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    for batch in reader {
        visit(&batch?)?;
    }
    Ok(())
}

/// Fetch a column by name, cast to the desired type, rejecting nulls
fn cast_column(batch: &RecordBatch, name: &str, ty: &DataType, path: &Path) -> Result<ArrayRef> {
    let corrupt = |reason: String| Error::CorruptTable {
        path: path.to_owned(),
        reason,
    };
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| corrupt(format!("missing column {name:?}")))?;
    let column = cast(column, ty).map_err(|e| corrupt(format!("column {name:?}: {e}")))?;
    // Lossy casts turn out-of-range values into nulls
    if column.null_count() > 0 {
        return Err(corrupt(format!(
            "column {name:?} has null or out-of-range values"
        )));
    }
    Ok(column)
}

/// Fetch a string column
pub fn string_column(batch: &RecordBatch, name: &str, path: &Path) -> Result<StringArray> {
    let column = cast_column(batch, name, &DataType::Utf8, path)?;
    Ok(column.as_string::<i32>().clone())
}

/// Fetch an integer column
pub fn primitive_column<T: ArrowPrimitiveType>(
    batch: &RecordBatch,
    name: &str,
    path: &Path,
) -> Result<PrimitiveArray<T>> {
    let column = cast_column(batch, name, &T::DATA_TYPE, path)?;
    Ok(column.as_primitive::<T>().clone())
}
