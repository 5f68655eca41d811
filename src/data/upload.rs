use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

use super::error::DataError;
use super::loader::DatasetSource;
use super::model::{missing_required, CellValue, Table};

/// Read the first worksheet of an uploaded xlsx file; row 0 is the header.
pub fn parse_upload(bytes: &[u8]) -> Result<Table, DataError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DataError::UploadUnreadable("workbook contains no sheets".into()))??;

    let mut rows = range.rows();
    let header = rows
        .next()
        .map(|r| r.iter().map(|c| data_to_cell(c).to_text()).collect())
        .unwrap_or_default();
    let rows = rows
        .map(|r| r.iter().map(data_to_cell).collect())
        .collect();

    Ok(Table { header, rows })
}

fn data_to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                CellValue::Integer(*f as i64)
            } else {
                CellValue::Float(*f)
            }
        }
        Data::Int(i) => CellValue::Integer(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("{e:?}")),
    }
}

/// Validate an uploaded workbook and append all of its rows to `source`.
///
/// Rows are reordered into `target_columns` (the sheet's current header);
/// columns the upload lacks are written empty. All-or-nothing: a missing
/// required field appends nothing.
pub fn append_upload(
    source: &mut dyn DatasetSource,
    target_columns: &[String],
    bytes: &[u8],
) -> Result<usize, DataError> {
    if !source.supports_append() {
        return Err(DataError::AppendUnsupported);
    }

    let table = parse_upload(bytes)?;
    let missing = missing_required(&table.header);
    if !missing.is_empty() {
        log::warn!("upload rejected, missing columns: {missing:?}");
        return Err(DataError::SchemaMismatch { missing });
    }

    let (header, records) = table.into_records();
    if records.is_empty() {
        return Ok(0);
    }
    let columns = if target_columns.is_empty() {
        header.as_slice()
    } else {
        target_columns
    };

    let rows: Vec<Vec<CellValue>> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| record.get(c).cloned().unwrap_or(CellValue::Empty))
                .collect()
        })
        .collect();

    let written = source.append(&rows)?;
    log::info!("appended {written} uploaded rows to {}", source.describe());
    Ok(written)
}
