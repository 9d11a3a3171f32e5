use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Reader};
use sha2::{Digest, Sha256};

use crate::dates::datetime_to_serial;
use crate::error::{ReportError, Result};
use crate::models::{
    CellValue, ParsedSheet, Row, DATE_COLUMNS, MERCHANT_NAME, WITHDRAWAL_AMOUNT, WITHDRAWAL_FEES,
};

const REQUIRED_COLUMNS: &[&str] = &[MERCHANT_NAME, WITHDRAWAL_AMOUNT, WITHDRAWAL_FEES];

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// parse_rows
// ---------------------------------------------------------------------------

/// Decodes the first sheet of an uploaded file into header names and rows.
///
/// The format is chosen from the file name's extension. Blank header columns
/// are dropped and fully blank data rows skipped.
pub fn parse_rows(bytes: &[u8], file_name: &str) -> Result<ParsedSheet> {
    let ext = extension(file_name);
    if ext == "csv" {
        parse_csv(bytes)
    } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        parse_spreadsheet(bytes)
    } else {
        Err(ReportError::UnexpectedFailure(format!(
            "Unsupported file type '{file_name}' (expected .csv, .xlsx, .xls or .ods)"
        )))
    }
}

fn parse_csv(bytes: &[u8]) -> Result<ParsedSheet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let cells = record.iter().enumerate().map(|(i, field)| {
            if headers.get(i).is_some_and(|h| h == MERCHANT_NAME) {
                text_cell(field)
            } else {
                csv_cell(field)
            }
        });
        if let Some(row) = build_row(&headers, cells) {
            rows.push(row);
        }
    }
    Ok(ParsedSheet {
        headers: headers.into_iter().filter(|h| !h.is_empty()).collect(),
        rows,
    })
}

fn text_cell(field: &str) -> CellValue {
    if field.trim().is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(field.to_string())
    }
}

fn csv_cell(field: &str) -> CellValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(field.to_string()),
    }
}

fn parse_spreadsheet(bytes: &[u8]) -> Result<ParsedSheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Err(ReportError::EmptySheet);
    };
    let range = range?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(ParsedSheet::default());
    };
    let headers: Vec<String> = header_row.iter().map(|c| c.to_string().trim().to_string()).collect();

    let mut rows = Vec::new();
    for data in sheet_rows {
        if let Some(row) = build_row(&headers, data.iter().map(spreadsheet_cell)) {
            rows.push(row);
        }
    }
    Ok(ParsedSheet {
        headers: headers.into_iter().filter(|h| !h.is_empty()).collect(),
        rows,
    })
}

fn spreadsheet_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => datetime_cell(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

/// Date cells are re-based onto the 1900 date system, so workbooks saved
/// with 1904 dates land on the same calendar days.
fn datetime_cell(dt: &ExcelDateTime) -> CellValue {
    if dt.is_duration() {
        return CellValue::Number(dt.as_f64());
    }
    dt.as_datetime()
        .map(|d| CellValue::Number(datetime_to_serial(d)))
        .unwrap_or_default()
}

/// Zips header names with cell values. Returns `None` for an all-blank row.
fn build_row(headers: &[String], mut cells: impl Iterator<Item = CellValue>) -> Option<Row> {
    let mut row = Row::new();
    let mut any_value = false;
    for header in headers {
        let value = cells.next().unwrap_or_default();
        if header.is_empty() {
            continue;
        }
        let value = match value {
            // Merchant names match as text, including numeric merchant IDs.
            CellValue::Number(n) if header == MERCHANT_NAME => CellValue::Text(n.to_string()),
            CellValue::Bool(b) if header == MERCHANT_NAME => CellValue::Text(b.to_string()),
            other => other,
        };
        any_value |= !value.is_empty();
        row.insert(header.clone(), value);
    }
    any_value.then_some(row)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Checks the header row for the columns a report needs, naming every one
/// that is absent.
pub fn validate_columns(headers: &[String]) -> Result<()> {
    let has = |name: &str| headers.iter().any(|h| h == name);
    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !has(**c))
        .map(|c| c.to_string())
        .collect();
    if !DATE_COLUMNS.iter().any(|c| has(*c)) {
        missing.push(DATE_COLUMNS.join(" / "));
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReportError::MissingColumns(missing))
    }
}

/// Parses and validates an upload, failing before anything is stored.
pub fn read_upload(bytes: &[u8], file_name: &str) -> Result<ParsedSheet> {
    let sheet = parse_rows(bytes, file_name)?;
    if sheet.rows.is_empty() {
        return Err(ReportError::EmptySheet);
    }
    validate_columns(&sheet.headers)?;
    Ok(sheet)
}

/// Distinct merchant names in first-seen order.
pub fn merchant_names(rows: &[Row]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in rows.iter().filter_map(Row::merchant) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Merchant Name,Withdrawal Amount,Withdrawal Fees,Date
Acme,100,5,01-01-2024
Acme,\"1,200.50\",10,2024-01-02
Globex,50,1,03-01-2024
,,,
";

    #[test]
    fn test_parse_csv_rows() {
        let sheet = parse_rows(CSV.as_bytes(), "withdrawals.csv").unwrap();
        assert_eq!(sheet.headers, vec!["Merchant Name", "Withdrawal Amount", "Withdrawal Fees", "Date"]);
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0].get("Withdrawal Amount"), Some(&CellValue::Number(100.0)));
        assert_eq!(sheet.rows[1].get("Withdrawal Amount"), Some(&CellValue::from("1,200.50")));
        assert_eq!(sheet.rows[0].get("Date"), Some(&CellValue::from("01-01-2024")));
    }

    #[test]
    fn test_parse_xlsx_rows() {
        let mut wb = rust_xlsxwriter::Workbook::new();
        let ws = wb.add_worksheet();
        for (c, h) in ["Merchant Name", "Withdrawal Amount", "Withdrawal Fees", "Date"].iter().enumerate() {
            ws.write_string(0, c as u16, *h).unwrap();
        }
        ws.write_string(1, 0, "Acme").unwrap();
        ws.write_number(1, 1, 100.0).unwrap();
        ws.write_number(1, 2, 5.0).unwrap();
        ws.write_number(1, 3, 45292.0).unwrap();
        let bytes = wb.save_to_buffer().unwrap();

        let sheet = parse_rows(&bytes, "upload.XLSX").unwrap();
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].merchant(), Some("Acme"));
        assert_eq!(sheet.rows[0].get("Date"), Some(&CellValue::Number(45292.0)));
    }

    #[test]
    fn test_xlsx_date_cells_become_serials() {
        let mut wb = rust_xlsxwriter::Workbook::new();
        let ws = wb.add_worksheet();
        let date_format = rust_xlsxwriter::Format::new().set_num_format("yyyy-mm-dd");
        for (c, h) in ["Merchant Name", "Withdrawal Amount", "Withdrawal Fees", "Transaction Date"].iter().enumerate() {
            ws.write_string(0, c as u16, *h).unwrap();
        }
        ws.write_number(1, 0, 1001.0).unwrap();
        ws.write_number(1, 1, 100.0).unwrap();
        ws.write_number(1, 2, 5.0).unwrap();
        let day = rust_xlsxwriter::ExcelDateTime::from_ymd(2024, 1, 5).unwrap();
        ws.write_datetime_with_format(1, 3, &day, &date_format).unwrap();
        let bytes = wb.save_to_buffer().unwrap();

        let sheet = parse_rows(&bytes, "dates.xlsx").unwrap();
        let row = &sheet.rows[0];
        assert_eq!(row.get("Transaction Date"), Some(&CellValue::Number(45296.0)));
        assert_eq!(crate::dates::normalize(row.get("Transaction Date").unwrap()), "2024-01-05");
        assert_eq!(row.merchant(), Some("1001"));
    }

    #[test]
    fn test_1904_date_cells_are_rebased() {
        use calamine::ExcelDateTimeType;
        // 2024-01-05 is serial 43834 in the 1904 date system.
        let cell = Data::DateTime(ExcelDateTime::new(43834.0, ExcelDateTimeType::DateTime, true));
        assert_eq!(spreadsheet_cell(&cell), CellValue::Number(45296.0));
        let plain = Data::DateTime(ExcelDateTime::new(45296.0, ExcelDateTimeType::DateTime, false));
        assert_eq!(spreadsheet_cell(&plain), CellValue::Number(45296.0));
    }

    #[test]
    fn test_numeric_merchant_names_stay_text() {
        let csv = "Merchant Name,Withdrawal Amount,Withdrawal Fees,Date\n\
                   1001,100,5,2024-01-05\n\
                   007,10,1,2024-01-05\n\
                   Acme,50,1,2024-01-05\n";
        let sheet = parse_rows(csv.as_bytes(), "ids.csv").unwrap();
        assert_eq!(sheet.rows[0].merchant(), Some("1001"));
        assert_eq!(sheet.rows[1].merchant(), Some("007"));
        assert_eq!(sheet.rows[0].get("Withdrawal Amount"), Some(&CellValue::Number(100.0)));
        assert_eq!(merchant_names(&sheet.rows), vec!["1001", "007", "Acme"]);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_rows(b"hello", "notes.txt").unwrap_err();
        assert!(matches!(err, ReportError::UnexpectedFailure(ref m) if m.contains("notes.txt")));
    }

    #[test]
    fn test_validate_columns_names_each_missing_column() {
        let headers = vec!["Merchant Name".to_string(), "Amount".to_string()];
        match validate_columns(&headers).unwrap_err() {
            ReportError::MissingColumns(cols) => assert_eq!(
                cols,
                vec![
                    "Withdrawal Amount".to_string(),
                    "Withdrawal Fees".to_string(),
                    "Date / Transaction Date / Created At".to_string(),
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_columns_accepts_any_date_column() {
        let headers: Vec<String> = ["Merchant Name", "Withdrawal Amount", "Withdrawal Fees", "Created At"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(validate_columns(&headers).is_ok());
    }

    #[test]
    fn test_read_upload_rejects_header_only_sheet() {
        let csv = "Merchant Name,Withdrawal Amount,Withdrawal Fees,Date\n";
        assert!(matches!(read_upload(csv.as_bytes(), "x.csv"), Err(ReportError::EmptySheet)));
    }

    #[test]
    fn test_merchant_names_first_seen_order() {
        let sheet = parse_rows(CSV.as_bytes(), "w.csv").unwrap();
        assert_eq!(merchant_names(&sheet.rows), vec!["Acme", "Globex"]);
    }

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(compute_checksum(b"abc"), compute_checksum(b"abc"));
        assert_ne!(compute_checksum(b"abc"), compute_checksum(b"abd"));
        assert_eq!(compute_checksum(b"").len(), 64);
    }
}
