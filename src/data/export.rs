use rust_xlsxwriter::{Format, Workbook};

use super::error::DataError;
use super::model::{CellValue, Dataset};

/// Download name offered for the filtered rows.
pub const EXPORT_FILE_NAME: &str = "filtered_data.xlsx";

/// Encode `rows` of `dataset` as a single-sheet xlsx workbook.
///
/// Row 0 holds the column names in dataset order; data rows follow in the
/// order given. Empty cells are left blank.
pub fn to_xlsx_bytes(dataset: &Dataset, rows: &[usize]) -> Result<Vec<u8>, DataError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let header_format = Format::new().set_bold();

    for (col, name) in dataset.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &header_format)?;
    }

    for (out_row, &idx) in rows.iter().enumerate() {
        let Some(record) = dataset.records.get(idx) else {
            continue;
        };
        let row = out_row as u32 + 1;
        for (col, name) in dataset.columns.iter().enumerate() {
            let col = col as u16;
            match record.get(name) {
                Some(CellValue::Text(s)) => {
                    worksheet.write_string(row, col, s)?;
                }
                Some(CellValue::Integer(i)) => {
                    worksheet.write_number(row, col, *i as f64)?;
                }
                Some(CellValue::Float(f)) => {
                    worksheet.write_number(row, col, *f)?;
                }
                Some(CellValue::Bool(b)) => {
                    worksheet.write_boolean(row, col, *b)?;
                }
                Some(CellValue::Empty) | None => {}
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    log::info!("exported {} rows ({} bytes)", rows.len(), bytes.len());
    Ok(bytes)
}
