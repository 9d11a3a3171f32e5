use comfy_table::{Cell, Table};

use crate::cli::open_service;
use crate::error::Result;
use crate::fmt::amount;
use crate::importer::merchant_names;
use crate::models::{parse_amount, WITHDRAWAL_AMOUNT, WITHDRAWAL_FEES};

pub fn run(panel: Option<&str>) -> Result<()> {
    let service = open_service()?;
    let panel = service.settings().resolve_panel(panel);
    let rows = service.store().get(&panel)?;

    let mut table = Table::new();
    table.set_header(vec!["Merchant", "Rows", "Withdrawals", "Fees"]);
    for name in merchant_names(rows) {
        let matching: Vec<_> = rows.iter().filter(|r| r.merchant() == Some(name.as_str())).collect();
        let withdrawals: f64 = matching.iter().map(|r| parse_amount(r.get(WITHDRAWAL_AMOUNT))).sum();
        let fees: f64 = matching.iter().map(|r| parse_amount(r.get(WITHDRAWAL_FEES))).sum();
        table.add_row(vec![
            Cell::new(&name),
            Cell::new(matching.len()),
            Cell::new(amount(withdrawals)),
            Cell::new(amount(fees)),
        ]);
    }
    println!("Panel {panel} ({} rows)\n{table}", rows.len());
    Ok(())
}
