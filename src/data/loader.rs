use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Date32Array, Date64Array, Float32Array, Float64Array,
    Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use calamine::{open_workbook_auto, Data, Reader};
use arrow::datatypes::{
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};
use chrono::NaiveTime;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::inference::number_cell;
use super::model::{CellValue, Column, Dataset};

/// Extensions accepted by [`load_file`].
pub fn supported_input_extensions() -> &'static [&'static str] {
    &[
        "csv", "tsv", "txt", "json", "parquet", "pq", "xlsx", "xlsm", "xlsb", "xls", "ods",
    ]
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a tabular dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – header row, delimiter detected from the header line
/// * `.tsv`          – tab separated
/// * `.json`         – `[{ "name": "...", "age": 30, ... }, ...]`
/// * `.parquet`      – flat columns of strings, numbers, booleans, dates
/// * `.xlsx` / `.xlsm` / `.xlsb` / `.xls` / `.ods` – first worksheet, header row first
///
/// Text cells are kept raw; column types are decided later by inference.
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" | "txt" => load_csv(path, None),
        "tsv" => load_csv(path, Some(b'\t')),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_excel(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;

    info!(
        "loaded {} rows x {} columns from {}",
        dataset.len(),
        dataset.width(),
        path.display()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per row.
/// Empty cells are the missing marker.
fn load_csv(path: &Path, delimiter: Option<u8>) -> Result<Dataset> {
    let bytes = std::fs::read(path).context("reading CSV file")?;
    let text = decode_text(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(text));
    debug!("CSV delimiter for {}: {:?}", path.display(), delimiter as char);

    read_csv_str(text, delimiter)
}

fn read_csv_str(text: &str, delimiter: u8) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.trim().is_empty() {
                        CellValue::Null
                    } else {
                        CellValue::Text(cell.to_string())
                    }
                })
                .collect(),
        );
    }

    Dataset::from_rows(headers, rows).context("building dataset from CSV")
}

/// UTF-8 when valid, otherwise Latin-1 (every byte maps to one char).
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

/// Most frequent of `, ; \t |` on the header line; comma on ties.
fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    [b',', b';', b'\t', b'|']
        .into_iter()
        .map(|d| (d, header.matches(d as char).count()))
        .fold((b',', 0), |best, cand| if cand.1 > best.1 { cand } else { best })
        .0
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "name": "Ayşe Yılmaz", "age": 22, "city": "İzmir" },
///   { "name": "Ali Veli", "age": null }
/// ]
/// ```
///
/// Columns appear in first-seen order; keys absent from a record are missing.
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|obj| {
            names
                .iter()
                .map(|name| obj.get(name).map(json_to_cell).unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();

    Dataset::from_rows(names, rows).context("building dataset from JSON")
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) if s.trim().is_empty() => CellValue::Null,
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

/// First worksheet only. The first row holds the column names; blank header
/// cells become `column_N`. Empty and error cells are missing.
fn load_excel(path: &Path) -> Result<Dataset> {
    let mut workbook = open_workbook_auto(path).context("opening workbook")?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("workbook has no worksheets")?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading worksheet '{sheet}'"))?;
    debug!("reading worksheet '{sheet}' of {}", path.display());

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Dataset::default());
    };
    let names: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell.to_string().trim() {
            "" => format!("column_{}", i + 1),
            name => name.to_string(),
        })
        .collect();
    let body = rows
        .map(|row| row.iter().map(excel_to_cell).collect())
        .collect();

    Dataset::from_rows(names, body).context("building dataset from worksheet")
}

fn excel_to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::String(s) if s.trim().is_empty() => CellValue::Null,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) if f.is_finite() => number_cell(*f),
        Data::Float(_) => CellValue::Null,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::Date)
            .unwrap_or_else(|| number_cell(dt.as_f64())),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat (non-nested) columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Nested columns are rendered as text.
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); names.len()];

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, values) in columns.iter_mut().enumerate() {
            let array = batch.column(col_idx);
            values.extend((0..batch.num_rows()).map(|row| extract_cell(array, row)));
        }
    }

    Dataset::new(
        names
            .into_iter()
            .zip(columns)
            .map(|(name, values)| Column::new(name, values))
            .collect(),
    )
    .context("building dataset from parquet")
}

// -- Parquet / Arrow helpers --

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let any = col.as_any();
    let cell = match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|s| CellValue::Text(s.value(row).to_string())),
        DataType::LargeUtf8 => Some(CellValue::Text(col.as_string::<i64>().value(row).to_string())),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| CellValue::Integer(a.value(row) as i64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| CellValue::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| CellValue::Float(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| CellValue::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| CellValue::Bool(a.value(row))),
        DataType::Date32 => any
            .downcast_ref::<Date32Array>()
            .and_then(|a| a.value_as_date(row))
            .map(|d| CellValue::Date(d.and_time(NaiveTime::MIN))),
        DataType::Date64 => any
            .downcast_ref::<Date64Array>()
            .and_then(|a| a.value_as_datetime(row))
            .map(CellValue::Date),
        DataType::Timestamp(unit, _) => {
            let datetime = match unit {
                TimeUnit::Second => col.as_primitive::<TimestampSecondType>().value_as_datetime(row),
                TimeUnit::Millisecond => {
                    col.as_primitive::<TimestampMillisecondType>().value_as_datetime(row)
                }
                TimeUnit::Microsecond => {
                    col.as_primitive::<TimestampMicrosecondType>().value_as_datetime(row)
                }
                TimeUnit::Nanosecond => {
                    col.as_primitive::<TimestampNanosecondType>().value_as_datetime(row)
                }
            };
            datetime.map(CellValue::Date)
        }
        _ => None,
    };

    cell.unwrap_or_else(|| {
        arrow::util::display::array_value_to_string(col, row)
            .map(CellValue::Text)
            .unwrap_or(CellValue::Null)
    })
}
