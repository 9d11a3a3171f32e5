use colored::Colorize;

use crate::cli::{open_service, print_json, rows_table};
use crate::error::Result;
use crate::fmt::amount;
use crate::models::MerchantPercents;
use crate::pipeline::GenerateRequest;
use crate::reports::ReportMode;

pub struct GenerateArgs {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub merchants: Vec<(String, String)>,
    pub percents: Option<String>,
    pub panel: Option<String>,
    pub summary_only: bool,
}

/// `--percents` file entries first, then `--merchant` flags, which override.
fn merchant_percents(args: &GenerateArgs) -> Result<MerchantPercents> {
    let mut percents = match &args.percents {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => MerchantPercents::new(),
    };
    for (name, pct) in &args.merchants {
        percents.insert(name.as_str(), pct.as_str());
    }
    Ok(percents)
}

pub fn run(args: GenerateArgs, json: bool) -> Result<()> {
    let request = GenerateRequest {
        merchant_percents: merchant_percents(&args)?,
        start_date: args.from_date,
        end_date: args.to_date,
        panel: args.panel,
        mode: args.summary_only.then_some(ReportMode::Summary),
    };

    let mut service = open_service()?;
    let resp = service.generate(request)?;

    if json {
        return print_json(&resp);
    }

    if let Some(report) = &resp.report {
        println!(
            "{} {} to {} ({} rows in range, {} mode)",
            "Payout report".bold(),
            report.start_date,
            report.end_date,
            report.rows_in_range,
            report.mode
        );
    }
    println!("{}", rows_table(&resp.summary));
    if let Some(report) = &resp.report {
        println!(
            "{} {}",
            "Total percent amount:".green().bold(),
            amount(report.grand_totals.total_percent_amount)
        );
    }
    println!("Written to {}", resp.file_path.display());
    println!("Download: {}", resp.download_url);
    Ok(())
}
