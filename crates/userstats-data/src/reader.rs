//! Input file discovery and parquet chunk loading.
//!
//! Each matching file is one chunk: it is read completely into memory, but
//! only one file is held at a time.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use tracing::{debug, warn};
use userstats_core::models::UserRecord;
use userstats_core::settings::ColumnNames;
use userstats_core::{Result, StatsError};

// ── Public API ────────────────────────────────────────────────────────────────

/// List the files directly inside `data_dir` whose name matches the glob
/// `pattern`, sorted by path.
///
/// The sort order is the chunk order of the run, and therefore decides which
/// copy of a duplicated user is kept.
pub fn find_data_files(data_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !data_dir.is_dir() {
        return Err(StatsError::DataPathNotFound(data_dir.to_path_buf()));
    }

    let matcher = glob::Pattern::new(pattern)
        .map_err(|e| StatsError::InvalidPattern(format!("{}: {}", pattern, e)))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in walkdir::WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| data_dir.to_path_buf());
            StatsError::FileRead {
                path,
                source: e.into(),
            }
        })?;

        let matches = entry
            .file_name()
            .to_str()
            .map(|name| matcher.matches(name))
            .unwrap_or(false);
        if entry.file_type().is_file() && matches {
            files.push(entry.into_path());
        }
    }

    files.sort();

    if files.is_empty() {
        warn!(
            "No files matching '{}' found in {}",
            pattern,
            data_dir.display()
        );
    }
    Ok(files)
}

/// Read one parquet file into [`UserRecord`]s, projecting only `columns`.
///
/// A column missing from the file is fatal. Values that cannot be cast to
/// the expected type (e.g. a non-numeric age) are read as null.
pub fn read_chunk(path: &Path, columns: &ColumnNames) -> Result<Vec<UserRecord>> {
    let file = File::open(path).map_err(|source| StatsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|source| StatsError::Parquet {
            path: path.to_path_buf(),
            source,
        })?;

    let schema = builder.schema();
    let mut roots = Vec::with_capacity(columns.names().len());
    for name in columns.names() {
        let idx = schema
            .index_of(name)
            .map_err(|_| StatsError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })?;
        roots.push(idx);
    }
    let mask = ProjectionMask::roots(builder.parquet_schema(), roots);

    let reader = builder
        .with_projection(mask)
        .build()
        .map_err(|source| StatsError::Parquet {
            path: path.to_path_buf(),
            source,
        })?;

    let mut records = Vec::new();
    for batch in reader {
        let arrow_err = |source| StatsError::Arrow {
            path: path.to_path_buf(),
            source,
        };
        let batch = batch.map_err(arrow_err)?;
        append_records(&batch, columns, &mut records).map_err(arrow_err)?;
    }

    debug!("Read {} rows from {}", records.len(), path.display());
    Ok(records)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn append_records(
    batch: &RecordBatch,
    columns: &ColumnNames,
    out: &mut Vec<UserRecord>,
) -> std::result::Result<(), ArrowError> {
    let ids = utf8_column(batch, &columns.user_id)?;
    let genders = utf8_column(batch, &columns.gender)?;
    let addresses = utf8_column(batch, &columns.address)?;
    let countries = utf8_column(batch, &columns.country)?;
    let purchases = utf8_column(batch, &columns.purchase_history)?;
    let logins = utf8_column(batch, &columns.login_history)?;
    let ages = cast(column(batch, &columns.age)?, &DataType::Int64)?;

    let ids = ids.as_string::<i32>();
    let genders = genders.as_string::<i32>();
    let addresses = addresses.as_string::<i32>();
    let countries = countries.as_string::<i32>();
    let purchases = purchases.as_string::<i32>();
    let logins = logins.as_string::<i32>();
    let ages = ages.as_primitive::<Int64Type>();

    let text = |array: &arrow::array::StringArray, row: usize| -> Option<String> {
        (!array.is_null(row)).then(|| array.value(row).to_string())
    };

    out.reserve(batch.num_rows());
    for row in 0..batch.num_rows() {
        out.push(UserRecord {
            user_id: text(ids, row).unwrap_or_default(),
            age: (!ages.is_null(row)).then(|| ages.value(row)),
            gender: text(genders, row),
            address: text(addresses, row),
            country: text(countries, row),
            purchase_history: text(purchases, row),
            login_history: text(logins, row),
        });
    }
    Ok(())
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> std::result::Result<&'a ArrayRef, ArrowError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ArrowError::SchemaError(format!("column '{}' missing from batch", name)))
}

fn utf8_column(batch: &RecordBatch, name: &str) -> std::result::Result<ArrayRef, ArrowError> {
    cast(column(batch, name)?, &DataType::Utf8)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
