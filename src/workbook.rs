use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::Result;
use crate::models::{CellValue, Row};
use crate::reports::round2;

pub const DETAILS_SHEET: &str = "Details";
pub const SUMMARY_SHEET: &str = "Summary";

/// A written report file.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: String,
    pub path: PathBuf,
}

/// Union of all row keys in first-seen order.
pub fn table_columns(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for column in rows.iter().flat_map(Row::columns) {
        if !columns.iter().any(|c| c == column) {
            columns.push(column.to_string());
        }
    }
    columns
}

/// Encodes named row tables as an XLSX workbook, one worksheet per table.
pub fn write_workbook(sheets: &[(&str, &[Row])]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let money = Format::new().set_num_format("0.00");

    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name)?;
        write_table(worksheet, rows, &header, &money)?;
    }
    Ok(workbook.save_to_buffer()?)
}

fn write_table(worksheet: &mut Worksheet, rows: &[Row], header: &Format, money: &Format) -> Result<()> {
    let columns = table_columns(rows);
    for (c, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, name, header)?;
    }
    for (r, row) in rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, name) in columns.iter().enumerate() {
            let c = c as u16;
            match row.get(name) {
                None | Some(CellValue::Empty) => {}
                Some(CellValue::Bool(b)) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                Some(CellValue::Number(n)) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Some(CellValue::Amount(n)) => {
                    worksheet.write_number_with_format(r, c, round2(*n), money)?;
                }
                Some(CellValue::Text(s)) => {
                    worksheet.write_string(r, c, s)?;
                }
            }
        }
    }
    if !columns.is_empty() {
        worksheet.set_freeze_panes(1, 0)?;
    }
    Ok(())
}

/// Picks `report-panel<panel>-<timestamp>.xlsx`, adding a counter if the name
/// is already taken.
fn unique_path(output_dir: &Path, panel: &str) -> (String, PathBuf) {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S-%3f");
    let base = format!("report-panel{panel}-{stamp}");
    let mut filename = format!("{base}.xlsx");
    let mut n = 1;
    while output_dir.join(&filename).exists() {
        filename = format!("{base}-{n}.xlsx");
        n += 1;
    }
    let path = output_dir.join(&filename);
    (filename, path)
}

/// Writes the two-sheet report workbook into `output_dir`.
pub fn write_report(output_dir: &Path, panel: &str, detail_rows: &[Row], summary_rows: &[Row]) -> Result<Artifact> {
    let bytes = write_workbook(&[(DETAILS_SHEET, detail_rows), (SUMMARY_SHEET, summary_rows)])?;
    std::fs::create_dir_all(output_dir)?;
    let (filename, path) = unique_path(output_dir, panel);
    std::fs::write(&path, bytes)?;
    tracing::info!(file = %path.display(), "report workbook written");
    Ok(Artifact { filename, path })
}
