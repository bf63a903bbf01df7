//! JSONL reading and writing.

use crate::record::Record;
use crate::schema::Schema;
use crate::value::Value;
use lumen_core::{AppError, AppResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One parsed JSONL row and its 1-based line number.
pub type Row = (usize, serde_json::Map<String, serde_json::Value>);

/// Parse JSONL content into rows, skipping blank lines.
///
/// # Errors
/// `AppError::Catalog` naming the line of the first malformed or non-object row.
pub fn parse_jsonl(content: &str) -> AppResult<Vec<Row>> {
    let mut rows = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| AppError::Catalog(format!("line {}: invalid JSON: {}", line_no, e)))?;

        match value {
            serde_json::Value::Object(object) => rows.push((line_no, object)),
            other => {
                return Err(AppError::Catalog(format!(
                    "line {}: expected a JSON object, got {}",
                    line_no, other
                )))
            }
        }
    }

    Ok(rows)
}

/// Convert one row to a record in schema column order.
///
/// # Errors
/// `AppError::Schema` naming line and column for undeclared columns, missing
/// or null values in non-nullable columns, and type mismatches.
pub fn record_from_row(schema: &Schema, row: &Row) -> AppResult<Record> {
    let (line_no, object) = row;

    if let Some(extra) = object.keys().find(|k| !schema.contains(k)) {
        return Err(AppError::Schema(format!(
            "line {}: column '{}' is not declared in the schema",
            line_no, extra
        )));
    }

    let mut record = Record::new();
    for field in schema.fields() {
        let value = match object.get(&field.name) {
            Some(json) => Value::coerce(json, &field.field_type).map_err(|e| {
                AppError::Schema(format!("line {}: column '{}': {}", line_no, field.name, e))
            })?,
            None => Value::Null,
        };

        if value.is_null() && !field.nullable {
            return Err(AppError::Schema(format!(
                "line {}: column '{}' is required but missing or null",
                line_no, field.name
            )));
        }

        record.insert(field.name.clone(), value);
    }

    Ok(record)
}

/// Load records from a JSONL file.
///
/// With `schema` every row is checked against it; without one the schema is
/// inferred from all rows first.
pub fn load_jsonl(path: &Path, schema: Option<Schema>) -> AppResult<(Schema, Vec<Record>)> {
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::Catalog(format!("Failed to read catalog at {:?}: {}", path, e))
    })?;

    let rows = parse_jsonl(&content)?;

    let schema = match schema {
        Some(schema) => schema,
        None => {
            let objects: Vec<_> = rows.iter().map(|(_, object)| object.clone()).collect();
            Schema::infer(&objects)?
        }
    };

    let records = rows
        .iter()
        .map(|row| record_from_row(&schema, row))
        .collect::<AppResult<Vec<_>>>()?;

    tracing::info!(
        "Loaded {} records with {} columns from {:?}",
        records.len(),
        schema.len(),
        path
    );

    Ok((schema, records))
}

/// Write records as JSONL into `dir`, appending `.jsonl` to `filename` when missing.
///
/// Returns the path written.
pub fn write_jsonl(records: &[Record], dir: &Path, filename: &str) -> AppResult<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::Catalog(format!("Failed to create directory {:?}: {}", dir, e)))?;

    let mut path = dir.join(filename);
    if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
        path = dir.join(format!("{}.jsonl", filename));
    }

    let mut file = fs::File::create(&path)?;
    for record in records {
        serde_json::to_writer(&mut file, record)?;
        file.write_all(b"\n")?;
    }

    tracing::debug!("Wrote {} records to {:?}", records.len(), path);
    Ok(path)
}
