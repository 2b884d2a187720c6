//! Parquet fixtures shared by the unit tests of this crate.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use userstats_core::models::UserRecord;

pub fn user_row(
    id: &str,
    age: Option<i64>,
    gender: Option<&str>,
    address: Option<&str>,
    country: Option<&str>,
    purchase: Option<&str>,
    login: Option<&str>,
) -> UserRecord {
    UserRecord {
        user_id: id.to_string(),
        age,
        gender: gender.map(str::to_string),
        address: address.map(str::to_string),
        country: country.map(str::to_string),
        purchase_history: purchase.map(str::to_string),
        login_history: login.map(str::to_string),
    }
}

/// A row with only the identifier and age populated.
pub fn bare_row(id: &str, age: Option<i64>) -> UserRecord {
    user_row(id, age, None, None, None, None, None)
}

/// Write `rows` to `dir/name` using the default column names.
pub fn write_users(dir: &Path, name: &str, rows: &[UserRecord]) -> PathBuf {
    let text = |f: fn(&UserRecord) -> Option<&str>| -> ArrayRef {
        Arc::new(rows.iter().map(f).collect::<StringArray>())
    };

    let utf8 = |name: &str| Field::new(name, DataType::Utf8, true);
    let schema = Arc::new(Schema::new(vec![
        utf8("user_name"),
        Field::new("age", DataType::Int64, true),
        utf8("gender"),
        utf8("address"),
        utf8("country"),
        utf8("purchase_history"),
        utf8("login_history"),
    ]));

    let batch = RecordBatch::try_new(
        schema,
        vec![
            text(|r| Some(r.user_id.as_str())),
            Arc::new(rows.iter().map(|r| r.age).collect::<Int64Array>()),
            text(|r| r.gender.as_deref()),
            text(|r| r.address.as_deref()),
            text(|r| r.country.as_deref()),
            text(|r| r.purchase_history.as_deref()),
            text(|r| r.login_history.as_deref()),
        ],
    )
    .expect("fixture batch matches schema");

    let path = dir.join(name);
    write_batch(&path, &batch);
    path
}

pub fn write_batch(path: &Path, batch: &RecordBatch) {
    let file = File::create(path).expect("create fixture file");
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).expect("open parquet writer");
    writer.write(batch).expect("write fixture batch");
    writer.close().expect("close parquet writer");
}
