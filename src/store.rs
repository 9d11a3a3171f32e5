use std::collections::HashMap;

use crate::dates;
use crate::error::{ReportError, Result};
use crate::models::{Row, DATE_ONLY};

/// Live datasets, one per panel.
///
/// The panel set is fixed at construction. `put` replaces a panel's rows
/// wholesale; the last writer wins.
#[derive(Debug, Default)]
pub struct DatasetStore {
    panels: Vec<String>,
    datasets: HashMap<String, Vec<Row>>,
}

impl DatasetStore {
    pub fn new<S: AsRef<str>>(panels: &[S]) -> Self {
        Self {
            panels: panels.iter().map(|p| p.as_ref().to_string()).collect(),
            datasets: HashMap::new(),
        }
    }

    pub fn panels(&self) -> &[String] {
        &self.panels
    }

    pub fn check_panel(&self, panel: &str) -> Result<()> {
        if self.panels.iter().any(|p| p == panel) {
            Ok(())
        } else {
            Err(ReportError::UnknownPanel(panel.to_string()))
        }
    }

    /// Stamps `DateOnly` on every row and replaces the panel's dataset.
    pub fn put(&mut self, panel: &str, rows: Vec<Row>) -> Result<usize> {
        self.check_panel(panel)?;
        let rows: Vec<Row> = rows.into_iter().map(stamp_date_only).collect();
        let count = rows.len();
        self.datasets.insert(panel.to_string(), rows);
        tracing::debug!(panel, rows = count, "dataset replaced");
        Ok(count)
    }

    /// The panel's rows; an absent or empty dataset is `NoDataAvailable`.
    pub fn get(&self, panel: &str) -> Result<&[Row]> {
        self.check_panel(panel)?;
        match self.datasets.get(panel) {
            Some(rows) if !rows.is_empty() => Ok(rows),
            _ => Err(ReportError::NoDataAvailable(panel.to_string())),
        }
    }

    pub fn len(&self, panel: &str) -> usize {
        self.datasets.get(panel).map_or(0, Vec::len)
    }
}

fn stamp_date_only(mut row: Row) -> Row {
    let day = row.date_source().map(dates::normalize).unwrap_or_default();
    row.insert(DATE_ONLY, day);
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn row(merchant: &str, date: CellValue) -> Row {
        Row::new().with("Merchant Name", merchant).with("Date", date)
    }

    #[test]
    fn test_put_stamps_date_only() {
        let mut store = DatasetStore::new(&["1", "2"]);
        store
            .put(
                "1",
                vec![
                    row("Acme", CellValue::from("05-06-2024")),
                    row("Acme", CellValue::Number(45292.0)),
                    row("Acme", CellValue::from("garbage")),
                ],
            )
            .unwrap();
        let rows = store.get("1").unwrap();
        let days: Vec<&str> = rows.iter().map(Row::date_only).collect();
        assert_eq!(days, vec!["2024-06-05", "2024-01-01", ""]);
    }

    #[test]
    fn test_put_replaces_whole_dataset() {
        let mut store = DatasetStore::new(&["1", "2"]);
        store.put("1", vec![row("A", CellValue::Empty), row("B", CellValue::Empty)]).unwrap();
        store.put("1", vec![row("C", CellValue::Empty)]).unwrap();
        assert_eq!(store.len("1"), 1);
        assert_eq!(store.get("1").unwrap()[0].merchant(), Some("C"));
    }

    #[test]
    fn test_panels_are_independent() {
        let mut store = DatasetStore::new(&["1", "2"]);
        store.put("2", vec![row("A", CellValue::Empty)]).unwrap();
        assert!(matches!(store.get("1"), Err(ReportError::NoDataAvailable(ref p)) if p == "1"));
        assert_eq!(store.len("2"), 1);
    }

    #[test]
    fn test_empty_dataset_is_no_data() {
        let mut store = DatasetStore::new(&["1"]);
        store.put("1", Vec::new()).unwrap();
        assert!(matches!(store.get("1"), Err(ReportError::NoDataAvailable(_))));
    }

    #[test]
    fn test_unknown_panel_rejected() {
        let mut store = DatasetStore::new(&["1", "2"]);
        assert!(matches!(store.put("9", Vec::new()), Err(ReportError::UnknownPanel(_))));
        assert!(matches!(store.get("9"), Err(ReportError::UnknownPanel(_))));
    }
}
