use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{MerchantPercents, ReportRecord, Row, UploadRecord};

pub fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

pub fn record_upload(conn: &Connection, record: &UploadRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO uploads (panel, original_file_name, storage_path, checksum, merchants, row_count, rows, uploaded_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.panel,
            record.original_file_name,
            record.storage_path,
            record.checksum,
            serde_json::to_string(&record.merchants)?,
            record.row_count as i64,
            serde_json::to_string(&record.rows)?,
            record.uploaded_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

const UPLOAD_COLUMNS: &str =
    "id, panel, original_file_name, storage_path, checksum, merchants, row_count, uploaded_at";

fn upload_from_row(row: &rusqlite::Row) -> rusqlite::Result<(UploadRecord, String)> {
    let merchants: String = row.get(5)?;
    Ok((
        UploadRecord {
            id: Some(row.get(0)?),
            panel: row.get(1)?,
            original_file_name: row.get(2)?,
            storage_path: row.get(3)?,
            checksum: row.get(4)?,
            merchants: Vec::new(),
            row_count: row.get::<_, i64>(6)? as usize,
            rows: Vec::new(),
            uploaded_at: row.get(7)?,
        },
        merchants,
    ))
}

/// Most recent upload for a panel, rows included.
pub fn latest_upload(conn: &Connection, panel: &str) -> Result<Option<UploadRecord>> {
    let sql = format!("SELECT {UPLOAD_COLUMNS}, rows FROM uploads WHERE panel = ?1 ORDER BY id DESC LIMIT 1");
    let found = conn
        .query_row(&sql, [panel], |row| {
            let (record, merchants) = upload_from_row(row)?;
            let rows: String = row.get(8)?;
            Ok((record, merchants, rows))
        })
        .optional()?;
    let Some((mut record, merchants, rows)) = found else {
        return Ok(None);
    };
    record.merchants = serde_json::from_str(&merchants)?;
    record.rows = serde_json::from_str::<Vec<Row>>(&rows)?;
    Ok(Some(record))
}

/// Upload history, newest first. Row payloads are not loaded.
pub fn list_uploads(conn: &Connection, panel: Option<&str>, limit: usize) -> Result<Vec<UploadRecord>> {
    let sql = format!(
        "SELECT {UPLOAD_COLUMNS} FROM uploads WHERE (?1 IS NULL OR panel = ?1) ORDER BY id DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(params![panel, limit as i64], upload_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raw.into_iter()
        .map(|(mut record, merchants)| -> Result<UploadRecord> {
            record.merchants = serde_json::from_str(&merchants)?;
            Ok(record)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

pub fn record_report(conn: &Connection, record: &ReportRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO reports (panel, start_date, end_date, merchant_percents, summary, download_url, file_path, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.panel,
            record.start_date,
            record.end_date,
            serde_json::to_string(&record.merchant_percents)?,
            serde_json::to_string(&record.summary)?,
            record.download_url,
            record.file_path,
            record.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Report history, newest first.
pub fn list_reports(conn: &Connection, panel: Option<&str>, limit: usize) -> Result<Vec<ReportRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, panel, start_date, end_date, merchant_percents, summary, download_url, file_path, created_at \
         FROM reports WHERE (?1 IS NULL OR panel = ?1) ORDER BY id DESC LIMIT ?2",
    )?;
    let raw = stmt
        .query_map(params![panel, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, panel, start_date, end_date, percents, summary, download_url, file_path, created_at)| -> Result<ReportRecord> {
            Ok(ReportRecord {
                id: Some(id),
                panel,
                start_date,
                end_date,
                merchant_percents: serde_json::from_str::<MerchantPercents>(&percents)?,
                summary: serde_json::from_str::<Vec<Row>>(&summary)?,
                download_url,
                file_path,
                created_at,
            })
        })
        .collect()
}

pub fn count_uploads(conn: &Connection, panel: &str) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM uploads WHERE panel = ?1", [panel], |r| r.get(0))?)
}

pub fn count_reports(conn: &Connection, panel: &str) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM reports WHERE panel = ?1", [panel], |r| r.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::models::CellValue;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn upload(panel: &str, name: &str) -> UploadRecord {
        UploadRecord {
            id: None,
            panel: panel.to_string(),
            original_file_name: name.to_string(),
            storage_path: format!("/tmp/{name}"),
            checksum: "abc".to_string(),
            merchants: vec!["Acme".to_string()],
            row_count: 1,
            rows: vec![Row::new()
                .with("Merchant Name", "Acme")
                .with("Withdrawal Amount", 100.0)
                .with("Date", CellValue::Number(45292.0))],
            uploaded_at: now_stamp(),
        }
    }

    #[test]
    fn test_latest_upload_returns_newest_for_panel() {
        let (_dir, conn) = test_db();
        record_upload(&conn, &upload("1", "first.csv")).unwrap();
        record_upload(&conn, &upload("1", "second.csv")).unwrap();
        record_upload(&conn, &upload("2", "other.csv")).unwrap();

        let latest = latest_upload(&conn, "1").unwrap().unwrap();
        assert_eq!(latest.original_file_name, "second.csv");
        assert_eq!(latest.merchants, vec!["Acme"]);
        assert_eq!(latest.rows.len(), 1);
        assert_eq!(latest.rows[0].get("Date"), Some(&CellValue::Number(45292.0)));
        assert!(latest_upload(&conn, "3").unwrap().is_none());
    }

    #[test]
    fn test_uploads_are_append_only() {
        let (_dir, conn) = test_db();
        record_upload(&conn, &upload("1", "a.csv")).unwrap();
        record_upload(&conn, &upload("1", "a.csv")).unwrap();
        assert_eq!(count_uploads(&conn, "1").unwrap(), 2);
        let all = list_uploads(&conn, None, 10).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].rows.is_empty());
        assert_eq!(list_uploads(&conn, Some("2"), 10).unwrap().len(), 0);
    }

    #[test]
    fn test_record_and_list_reports() {
        let (_dir, conn) = test_db();
        let mut percents = MerchantPercents::new();
        percents.insert("Zeta", "1");
        percents.insert("Acme", "2.5");
        let record = ReportRecord {
            id: None,
            panel: "2".to_string(),
            start_date: "2024-01-01".to_string(),
            end_date: "2024-01-31".to_string(),
            merchant_percents: percents.clone(),
            summary: vec![Row::new().with("Merchant Name", "Grand Total").with("Total", CellValue::Amount(7.5))],
            download_url: "/output/report.xlsx".to_string(),
            file_path: "/tmp/report.xlsx".to_string(),
            created_at: now_stamp(),
        };
        record_report(&conn, &record).unwrap();

        let reports = list_reports(&conn, Some("2"), 5).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].merchant_percents, percents);
        assert_eq!(reports[0].summary[0].get("Total"), Some(&CellValue::Text("7.50".into())));
        assert_eq!(count_reports(&conn, "2").unwrap(), 1);
        assert!(list_reports(&conn, Some("1"), 5).unwrap().is_empty());
    }
}
