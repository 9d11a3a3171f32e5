use std::path::Path;

use colored::Colorize;

use crate::cli::{open_service, print_json};
use crate::error::Result;
use crate::pipeline::UploadedFile;

pub fn run(file: &str, panel: Option<&str>, json: bool) -> Result<()> {
    let path = Path::new(file);
    let upload = if path.exists() {
        Some(UploadedFile::read(path)?)
    } else {
        None
    };

    let mut service = open_service()?;
    let resp = service.upload(upload, panel)?;

    if json {
        return print_json(&resp);
    }

    let panel = service.settings().resolve_panel(panel);
    println!(
        "{} {} rows into panel {panel}",
        "Uploaded".green().bold(),
        resp.count
    );
    println!("{} merchants:", resp.merchants.len());
    for name in &resp.merchants {
        println!("  {name}");
    }
    Ok(())
}
