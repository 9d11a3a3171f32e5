use comfy_table::{Cell, Table};

use crate::cli::{open_service, print_json};
use crate::error::Result;
use crate::history::{list_reports, list_uploads};

pub fn uploads(panel: Option<&str>, limit: usize, json: bool) -> Result<()> {
    let service = open_service()?;
    let records = list_uploads(service.conn(), panel, limit)?;
    if json {
        return print_json(&records);
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Panel", "File", "Rows", "Merchants", "Uploaded"]);
    for r in records {
        table.add_row(vec![
            Cell::new(r.id.unwrap_or_default()),
            Cell::new(r.panel),
            Cell::new(r.original_file_name),
            Cell::new(r.row_count),
            Cell::new(r.merchants.len()),
            Cell::new(r.uploaded_at),
        ]);
    }
    println!("Uploads\n{table}");
    Ok(())
}

pub fn reports(panel: Option<&str>, limit: usize, json: bool) -> Result<()> {
    let service = open_service()?;
    let records = list_reports(service.conn(), panel, limit)?;
    if json {
        return print_json(&records);
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Panel", "From", "To", "Merchants", "Download", "Created"]);
    for r in records {
        table.add_row(vec![
            Cell::new(r.id.unwrap_or_default()),
            Cell::new(r.panel),
            Cell::new(r.start_date),
            Cell::new(r.end_date),
            Cell::new(r.merchant_percents.len()),
            Cell::new(r.download_url),
            Cell::new(r.created_at),
        ]);
    }
    println!("Reports\n{table}");
    Ok(())
}
