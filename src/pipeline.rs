use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{get_connection, init_db};
use crate::error::{ReportError, Result};
use crate::history::{self, now_stamp};
use crate::importer::{compute_checksum, merchant_names, read_upload};
use crate::models::{MerchantPercents, ReportRecord, Row, UploadRecord};
use crate::reports::{self, Report, ReportMode};
use crate::settings::Settings;
use crate::store::DatasetStore;
use crate::workbook;

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

/// An uploaded spreadsheet: original file name plus raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Ok(Self { file_name, bytes })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub merchants: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub merchant_percents: MerchantPercents,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub panel: Option<String>,
    /// Overrides the configured report mode for this request.
    #[serde(default)]
    pub mode: Option<ReportMode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub summary: Vec<Row>,
    pub download_url: String,
    #[serde(skip)]
    pub file_path: PathBuf,
    #[serde(skip)]
    pub report: Option<Report>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&ReportError> for ErrorResponse {
    fn from(e: &ReportError) -> Self {
        Self { error: e.to_string() }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// The upload and generate flows over one data directory.
pub struct Service {
    settings: Settings,
    conn: Connection,
    store: DatasetStore,
}

impl Service {
    /// Opens the history database under the data directory and rehydrates
    /// every panel from its latest upload.
    pub fn open(settings: Settings) -> Result<Self> {
        settings.validate()?;
        std::fs::create_dir_all(settings.data_path())?;
        let conn = get_connection(&settings.db_path())?;
        init_db(&conn)?;
        let mut service = Self {
            store: DatasetStore::new(settings.panels.as_slice()),
            settings,
            conn,
        };
        service.rehydrate();
        Ok(service)
    }

    fn rehydrate(&mut self) {
        for panel in self.settings.panels.clone() {
            match history::latest_upload(&self.conn, &panel) {
                Ok(Some(record)) => match self.store.put(&panel, record.rows) {
                    Ok(rows) => tracing::debug!(panel = %panel, rows, "dataset rehydrated"),
                    Err(e) => tracing::warn!(panel = %panel, error = %e, "rehydration skipped"),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!(panel = %panel, error = %e, "stored upload unreadable, skipping"),
            }
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Validates the file, replaces the panel's dataset and records the upload.
    pub fn upload(&mut self, file: Option<UploadedFile>, panel: Option<&str>) -> Result<UploadResponse> {
        let panel = self.settings.resolve_panel(panel);
        self.store.check_panel(&panel)?;
        let file = match file {
            Some(f) if !f.bytes.is_empty() => f,
            _ => return Err(ReportError::NoFileUploaded),
        };
        tracing::info!(panel = %panel, file = %file.file_name, bytes = file.bytes.len(), "upload received");

        let sheet = read_upload(&file.bytes, &file.file_name)?;
        let merchants = merchant_names(&sheet.rows);
        let storage_path = self.store_source_file(&panel, &file)?;

        let count = self.store.put(&panel, sheet.rows)?;
        let record = UploadRecord {
            id: None,
            panel: panel.clone(),
            original_file_name: file.file_name.clone(),
            storage_path: storage_path.to_string_lossy().to_string(),
            checksum: compute_checksum(&file.bytes),
            merchants: merchants.clone(),
            row_count: count,
            rows: self.store.get(&panel)?.to_vec(),
            uploaded_at: now_stamp(),
        };
        let id = history::record_upload(&self.conn, &record)?;
        tracing::info!(panel = %panel, rows = count, merchants = merchants.len(), id, "upload recorded");

        Ok(UploadResponse {
            success: true,
            merchants,
            count,
        })
    }

    /// Copies the source file to `uploads/<panel>/<timestamp>-<name>`.
    fn store_source_file(&self, panel: &str, file: &UploadedFile) -> Result<PathBuf> {
        let dir = self.settings.uploads_dir().join(panel);
        std::fs::create_dir_all(&dir)?;
        let name = Path::new(&file.file_name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S-%3f");
        let mut path = dir.join(format!("{stamp}-{name}"));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{stamp}-{n}-{name}"));
            n += 1;
        }
        std::fs::write(&path, &file.bytes)?;
        Ok(path)
    }

    /// Runs the report engine over the panel's dataset, writes the workbook
    /// and records the report.
    pub fn generate(&mut self, request: GenerateRequest) -> Result<GenerateResponse> {
        let (start, end) = match (filter(&request.start_date), filter(&request.end_date)) {
            (Some(s), Some(e)) if !request.merchant_percents.is_empty() => (s, e),
            _ => return Err(ReportError::MissingFilters),
        };
        let panel = self.settings.resolve_panel(request.panel.as_deref());
        let mode = request.mode.unwrap_or(self.settings.report_mode);

        let dataset = self.store.get(&panel)?;
        let report = reports::generate(dataset, start, end, &request.merchant_percents, mode)?;
        tracing::info!(
            panel = %panel,
            rows = report.rows_in_range,
            merchants = report.merchants.len(),
            mode = %mode,
            "report generated"
        );

        let artifact = workbook::write_report(
            &self.settings.output_dir(),
            &panel,
            &report.detail_rows,
            &report.summary_rows,
        )?;
        let download_url = self.settings.download_url(&artifact.filename);

        let record = ReportRecord {
            id: None,
            panel: panel.clone(),
            start_date: report.start_date.clone(),
            end_date: report.end_date.clone(),
            merchant_percents: request.merchant_percents,
            summary: report.summary_rows.clone(),
            download_url: download_url.clone(),
            file_path: artifact.path.to_string_lossy().to_string(),
            created_at: now_stamp(),
        };
        let id = history::record_report(&self.conn, &record)?;
        tracing::info!(panel = %panel, id, file = %artifact.filename, "report recorded");

        Ok(GenerateResponse {
            success: true,
            summary: report.summary_rows.clone(),
            download_url,
            file_path: artifact.path,
            report: Some(report),
        })
    }
}

fn filter(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
