pub mod generate;
pub mod history;
pub mod init;
pub mod merchants;
pub mod status;
pub mod upload;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt;
use crate::models::Row;
use crate::pipeline::Service;
use crate::settings::load_settings;
use crate::workbook::table_columns;

#[derive(Parser)]
#[command(name = "payout", about = "Merchant withdrawal payout reports from uploaded spreadsheets.")]
pub struct Cli {
    /// Print the raw JSON response body instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the history database.
    Init {
        /// Path for payout data (default: ~/Documents/payout)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Upload a CSV/XLSX withdrawal export, replacing the panel's dataset.
    Upload {
        /// Path to CSV or XLSX file
        file: String,
        /// Panel to upload into (default from settings)
        #[arg(long)]
        panel: Option<String>,
    },
    /// Generate a payout report workbook for a date range.
    Generate {
        /// Start date (YYYY-MM-DD, DD-MM-YYYY, ...)
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date, inclusive
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Merchant percentage as NAME=PCT; repeatable, order is kept
        #[arg(long = "merchant", value_name = "NAME=PCT", value_parser = parse_merchant_percent)]
        merchants: Vec<(String, String)>,
        /// JSON file with a {"merchant": "percent"} object
        #[arg(long)]
        percents: Option<String>,
        /// Panel to report on (default from settings)
        #[arg(long)]
        panel: Option<String>,
        /// Details sheet holds the filtered source rows only
        #[arg(long = "summary-only")]
        summary_only: bool,
    },
    /// List merchants in a panel's live dataset.
    Merchants {
        #[arg(long)]
        panel: Option<String>,
    },
    /// Show recorded uploads or reports.
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Show settings, paths and per-panel dataset sizes.
    Status,
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List recorded uploads, newest first.
    Uploads {
        #[arg(long)]
        panel: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// List generated reports, newest first.
    Reports {
        #[arg(long)]
        panel: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

/// Splits `NAME=PCT` on the last `=`.
fn parse_merchant_percent(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, pct) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=PCT, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing merchant name in '{raw}'"));
    }
    Ok((name.to_string(), pct.trim().to_string()))
}

pub(crate) fn open_service() -> Result<Service> {
    Service::open(load_settings())
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Renders rows as a table whose header is the union of their columns.
pub(crate) fn rows_table(rows: &[Row]) -> Table {
    let columns = table_columns(rows);
    let mut table = Table::new();
    table.set_header(columns.clone());
    for row in rows {
        table.add_row(
            columns
                .iter()
                .map(|c| Cell::new(fmt::cell(row.get(c))))
                .collect::<Vec<_>>(),
        );
    }
    table
}
