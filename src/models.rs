use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const MERCHANT_NAME: &str = "Merchant Name";
pub const WITHDRAWAL_AMOUNT: &str = "Withdrawal Amount";
pub const WITHDRAWAL_FEES: &str = "Withdrawal Fees";
pub const DATE_ONLY: &str = "DateOnly";

/// Date-bearing columns, in lookup priority order.
pub const DATE_COLUMNS: &[&str] = &["Date", "Transaction Date", "Created At"];

/// A single spreadsheet cell.
///
/// `Amount` is an output-only value: a figure that displays and serializes
/// with exactly two decimals.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    Amount(f64),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Amount(n) => write!(f, "{n:.2}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Amount(n) => serializer.serialize_str(&format!("{n:.2}")),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCell {
    Empty(()),
    Bool(bool),
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawCell::deserialize(deserializer)? {
            RawCell::Empty(()) => Self::Empty,
            RawCell::Bool(b) => Self::Bool(b),
            RawCell::Number(n) => Self::Number(n),
            RawCell::Text(s) => Self::Text(s),
        })
    }
}

/// An ordered mapping of column name to cell value.
///
/// Rows in one table may carry different column sets; a missing key is an
/// implicitly blank cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| k == column).map(|(_, v)| v)
    }

    /// Sets a cell, keeping the column's original position if it exists.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(k, _)| *k == column) {
            Some(slot) => slot.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    /// Text of `Merchant Name`, if present and non-blank.
    pub fn merchant(&self) -> Option<&str> {
        match self.get(MERCHANT_NAME)? {
            CellValue::Text(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// The canonical day stamped at ingest, or "" if the row has none.
    pub fn date_only(&self) -> &str {
        self.get(DATE_ONLY).and_then(CellValue::as_str).unwrap_or("")
    }

    /// First non-blank date-bearing cell.
    pub fn date_source(&self) -> Option<&CellValue> {
        DATE_COLUMNS
            .iter()
            .filter_map(|c| self.get(c))
            .find(|v| !v.is_empty())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (k, v) in &self.cells {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column name to cell value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
                let mut row = Row::new();
                while let Some((k, v)) = access.next_entry::<String, CellValue>()? {
                    row.insert(k, v);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// Merchant name to requested percentage, kept in request order.
///
/// Values stay raw; entries that do not parse to a finite number are
/// skipped at generation time rather than rejected here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MerchantPercents {
    entries: Vec<(String, String)>,
}

impl MerchantPercents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry; a repeated merchant overwrites the earlier value in place.
    pub fn insert(&mut self, merchant: impl Into<String>, percent: impl Into<String>) {
        let merchant = merchant.into();
        let percent = percent.into();
        match self.entries.iter_mut().find(|(m, _)| *m == merchant) {
            Some(slot) => slot.1 = percent,
            None => self.entries.push((merchant, percent)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(m, p)| (m.as_str(), p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<M: Into<String>, P: Into<String>> FromIterator<(M, P)> for MerchantPercents {
    fn from_iter<I: IntoIterator<Item = (M, P)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (m, p) in iter {
            map.insert(m, p);
        }
        map
    }
}

/// Parses a requested percentage. A trailing `%` is tolerated.
pub fn parse_percent(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let s = s.strip_suffix('%').unwrap_or(s).trim();
    s.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Reads a money cell. Missing, blank or non-numeric values count as zero.
pub fn parse_amount(value: Option<&CellValue>) -> f64 {
    let n = match value {
        Some(CellValue::Number(n)) | Some(CellValue::Amount(n)) => *n,
        Some(CellValue::Text(raw)) => parse_amount_str(raw),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

fn parse_amount_str(raw: &str) -> f64 {
    let s = raw.replace(',', "").replace('"', "").replace('$', "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return -inner.trim().parse::<f64>().unwrap_or(0.0);
    }
    s.parse().unwrap_or(0.0)
}

impl Serialize for MerchantPercents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (m, p) in &self.entries {
            map.serialize_entry(m, p)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MerchantPercents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(merchant, value)| {
                let percent = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (merchant, percent)
            })
            .collect())
    }
}

/// Header row and data rows of the first sheet of an uploaded file.
#[derive(Debug, Clone, Default)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// Persisted history of a successful upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: Option<i64>,
    pub panel: String,
    pub original_file_name: String,
    pub storage_path: String,
    pub checksum: String,
    pub merchants: Vec<String>,
    pub row_count: usize,
    #[serde(skip)]
    pub rows: Vec<Row>,
    pub uploaded_at: String,
}

/// Persisted history of a successful report generation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub id: Option<i64>,
    pub panel: String,
    pub start_date: String,
    pub end_date: String,
    pub merchant_percents: MerchantPercents,
    pub summary: Vec<Row>,
    pub download_url: String,
    pub file_path: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(Some(&CellValue::Number(12.5))), 12.5);
        assert_eq!(parse_amount(Some(&CellValue::from("1,234.56"))), 1234.56);
        assert_eq!(parse_amount(Some(&CellValue::from("$50.00"))), 50.0);
        assert_eq!(parse_amount(Some(&CellValue::from("(20.00)"))), -20.0);
        assert_eq!(parse_amount(Some(&CellValue::from("n/a"))), 0.0);
        assert_eq!(parse_amount(Some(&CellValue::from("NaN"))), 0.0);
        assert_eq!(parse_amount(Some(&CellValue::Empty)), 0.0);
        assert_eq!(parse_amount(None), 0.0);
    }

    #[test]
    fn test_row_insert_keeps_column_position() {
        let mut row = Row::new().with("A", 1.0).with("B", "x");
        row.insert("A", 2.0);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(row.get("A"), Some(&CellValue::Number(2.0)));
    }

    #[test]
    fn test_row_merchant_ignores_blank_and_numbers() {
        assert_eq!(Row::new().with(MERCHANT_NAME, "Acme").merchant(), Some("Acme"));
        assert_eq!(Row::new().with(MERCHANT_NAME, "  ").merchant(), None);
        assert_eq!(Row::new().with(MERCHANT_NAME, 42.0).merchant(), None);
        assert_eq!(Row::new().merchant(), None);
    }

    #[test]
    fn test_date_source_prefers_first_non_blank_column() {
        let row = Row::new()
            .with("Date", "")
            .with("Created At", "2024-01-03")
            .with("Transaction Date", "2024-01-02");
        assert_eq!(row.date_source(), Some(&CellValue::from("2024-01-02")));
    }

    #[test]
    fn test_row_json_roundtrip_preserves_order_and_types() {
        let row = Row::new()
            .with("Merchant Name", "Acme")
            .with("Withdrawal Amount", 100.5)
            .with("Note", CellValue::Empty)
            .with("Flag", CellValue::Bool(true));
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Merchant Name":"Acme","Withdrawal Amount":100.5,"Note":null,"Flag":true}"#);
        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_amount_serializes_with_two_decimals() {
        let row = Row::new().with("Total", CellValue::Amount(7.5));
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"Total":"7.50"}"#);
        assert_eq!(CellValue::Amount(1.0 / 3.0).to_string(), "0.33");
    }

    #[test]
    fn test_merchant_percents_keep_request_order() {
        let map: MerchantPercents =
            serde_json::from_str(r#"{"Zeta": "1", "Acme": 2.5, "Beta": "x"}"#).unwrap();
        let entries: Vec<_> = map.iter().collect();
        assert_eq!(entries, vec![("Zeta", "1"), ("Acme", "2.5"), ("Beta", "x")]);
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("2.5"), Some(2.5));
        assert_eq!(parse_percent(" 10% "), Some(10.0));
        assert_eq!(parse_percent("abc"), None);
        assert_eq!(parse_percent(""), None);
        assert_eq!(parse_percent("NaN"), None);
        assert_eq!(parse_percent("inf"), None);
    }
}
