use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveTime};
use log::info;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value as JsonValue};

use super::model::{CellValue, Dataset};

/// Extensions accepted by [`write_file`].
pub fn supported_output_extensions() -> &'static [&'static str] {
    &["csv", "tsv", "json", "parquet"]
}

/// Write a dataset to a file, picking the format from the extension.
///
/// Row order and column order are written exactly as they are in `dataset`.
pub fn write_file(dataset: &Dataset, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        // BOM so spreadsheet tools pick UTF-8 for non-ASCII names.
        "csv" => write_delimited(dataset, path, b',', true),
        "tsv" => write_delimited(dataset, path, b'\t', false),
        "json" => write_json(dataset, path),
        "parquet" => write_parquet(dataset, path),
        other => bail!("Unsupported export extension: .{other}"),
    }?;

    info!("wrote {} rows to {}", dataset.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV / TSV
// ---------------------------------------------------------------------------

fn write_delimited(dataset: &Dataset, path: &Path, delimiter: u8, bom: bool) -> Result<()> {
    let mut file = BufWriter::new(File::create(path).context("creating export file")?);
    if bom {
        file.write_all("\u{feff}".as_bytes()).context("writing BOM")?;
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(file);
    writer
        .write_record(dataset.column_names())
        .context("writing header")?;

    for row in 0..dataset.len() {
        let record = dataset.columns().iter().map(|c| {
            c.values[row]
                .as_text()
                .map(|t| t.into_owned())
                .unwrap_or_default()
        });
        writer
            .write_record(record)
            .with_context(|| format!("writing row {row}"))?;
    }
    writer.flush().context("flushing export file")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON (records)
// ---------------------------------------------------------------------------

fn write_json(dataset: &Dataset, path: &Path) -> Result<()> {
    let records: Vec<JsonValue> = (0..dataset.len())
        .map(|row| {
            let obj: Map<String, JsonValue> = dataset
                .columns()
                .iter()
                .map(|c| (c.name.clone(), cell_to_json(&c.values[row])))
                .collect();
            JsonValue::Object(obj)
        })
        .collect();

    let file = BufWriter::new(File::create(path).context("creating export file")?);
    serde_json::to_writer_pretty(file, &records).context("writing JSON")?;
    Ok(())
}

fn cell_to_json(value: &CellValue) -> JsonValue {
    match value {
        CellValue::Integer(i) => JsonValue::from(*i),
        CellValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        CellValue::Bool(b) => JsonValue::Bool(*b),
        CellValue::Null => JsonValue::Null,
        other => other
            .as_text()
            .map(|t| JsonValue::String(t.into_owned()))
            .unwrap_or(JsonValue::Null),
    }
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Physical type chosen for a column from its non-missing cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Date,
    Text,
}

fn column_kind(values: &[CellValue]) -> ColumnKind {
    values
        .iter()
        .filter(|v| !v.is_missing())
        .map(|v| match v {
            CellValue::Integer(_) => ColumnKind::Integer,
            CellValue::Float(_) => ColumnKind::Float,
            CellValue::Bool(_) => ColumnKind::Boolean,
            CellValue::Date(d) if d.time() == NaiveTime::MIN => ColumnKind::Date,
            _ => ColumnKind::Text,
        })
        .reduce(|a, b| match (a, b) {
            _ if a == b => a,
            (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        })
        .unwrap_or(ColumnKind::Text)
}

fn column_array(values: &[CellValue]) -> (DataType, ArrayRef) {
    match column_kind(values) {
        ColumnKind::Integer => (
            DataType::Int64,
            Arc::new(Int64Array::from(
                values
                    .iter()
                    .map(|v| match v {
                        CellValue::Integer(i) => Some(*i),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
        ),
        ColumnKind::Float => (
            DataType::Float64,
            Arc::new(Float64Array::from(
                values.iter().map(CellValue::as_f64).collect::<Vec<_>>(),
            )),
        ),
        ColumnKind::Boolean => (
            DataType::Boolean,
            Arc::new(BooleanArray::from(
                values.iter().map(CellValue::as_bool).collect::<Vec<_>>(),
            )),
        ),
        ColumnKind::Date => {
            let epoch = NaiveDate::default();
            (
                DataType::Date32,
                Arc::new(Date32Array::from(
                    values
                        .iter()
                        .map(|v| v.as_date().map(|d| (d.date() - epoch).num_days() as i32))
                        .collect::<Vec<_>>(),
                )),
            )
        }
        ColumnKind::Text => (
            DataType::Utf8,
            Arc::new(StringArray::from(
                values
                    .iter()
                    .map(|v| v.as_text().map(|t| t.into_owned()))
                    .collect::<Vec<_>>(),
            )),
        ),
    }
}

/// Arrow view of a dataset; one typed array per column.
pub fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch> {
    if dataset.width() == 0 {
        bail!("Cannot build a record batch without columns");
    }

    let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = dataset
        .columns()
        .iter()
        .map(|c| {
            let (data_type, array) = column_array(&c.values);
            (Field::new(c.name.as_str(), data_type, true), array)
        })
        .unzip();
    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, arrays).context("building record batch")
}

fn write_parquet(dataset: &Dataset, path: &Path) -> Result<()> {
    let batch = to_record_batch(dataset)?;
    let schema = batch.schema();

    let file = File::create(path).context("creating export file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;
    use arrow::array::Array;

    #[test]
    fn column_kind_widens_mixed_numbers_and_falls_back_to_text() {
        assert_eq!(
            column_kind(&[CellValue::Integer(1), CellValue::Null, CellValue::Float(2.5)]),
            ColumnKind::Float
        );
        assert_eq!(
            column_kind(&[CellValue::Integer(1), CellValue::Text("x".into())]),
            ColumnKind::Text
        );
        assert_eq!(column_kind(&[CellValue::Null]), ColumnKind::Text);
    }

    #[test]
    fn json_nulls_and_numbers() {
        assert_eq!(cell_to_json(&CellValue::Float(f64::NAN)), JsonValue::Null);
        assert_eq!(cell_to_json(&CellValue::Integer(3)), JsonValue::from(3));
    }

    #[test]
    fn csv_export_has_bom_and_empty_missing_cells() {
        let ds = Dataset::new(vec![
            Column::new("name", vec![CellValue::Text("Ayşe".into()), CellValue::Text("Ali".into())]),
            Column::new("age", vec![CellValue::Integer(22), CellValue::Null]),
        ])
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_file(&ds, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with('\u{feff}'));
        assert_eq!(text.trim_start_matches('\u{feff}'), "name,age\nAyşe,22\nAli,\n");
    }

    #[test]
    fn record_batch_uses_typed_arrays() {
        let ds = Dataset::new(vec![
            Column::new("age", vec![CellValue::Integer(22), CellValue::Null]),
            Column::new("score", vec![CellValue::Float(1.5), CellValue::Integer(2)]),
        ])
        .unwrap();
        let batch = to_record_batch(&ds).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Int64);
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Float64);
        assert_eq!(batch.column(0).null_count(), 1);
        assert!(to_record_batch(&Dataset::default()).is_err());
    }

    #[test]
    fn rejects_unknown_extension() {
        let ds = Dataset::default();
        assert!(write_file(&ds, Path::new("out.xlsx")).is_err());
    }
}
