use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::bytes;
use crate::history::{count_reports, count_uploads};
use crate::pipeline::Service;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Mode:       {}", settings.report_mode);
    println!("Downloads:  {}", settings.download_prefix);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `payout init` to set up.");
        return Ok(());
    }
    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", bytes(size));

    let service = Service::open(settings)?;
    let mut table = Table::new();
    table.set_header(vec!["Panel", "Live rows", "Uploads", "Reports"]);
    for panel in service.store().panels() {
        let marker = if *panel == service.settings().default_panel { " *" } else { "" };
        table.add_row(vec![
            Cell::new(format!("{panel}{marker}")),
            Cell::new(service.store().len(panel)),
            Cell::new(count_uploads(service.conn(), panel)?),
            Cell::new(count_reports(service.conn(), panel)?),
        ]);
    }
    println!();
    println!("{table}");
    Ok(())
}
