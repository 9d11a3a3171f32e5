use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    settings.validate()?;

    let root = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&root)?;
    std::fs::create_dir_all(settings.uploads_dir())?;
    std::fs::create_dir_all(settings.output_dir())?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    save_settings(&settings)?;

    println!("Initialized payout data in {}", root.display());
    println!("Panels: {}", settings.panels.join(", "));
    Ok(())
}
