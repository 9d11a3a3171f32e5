mod cli;
mod dates;
mod db;
mod error;
mod fmt;
mod history;
mod importer;
mod models;
mod pipeline;
mod reports;
mod settings;
mod store;
mod workbook;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{generate::GenerateArgs, Cli, Commands, HistoryCommands};
use pipeline::ErrorResponse;

/// `PAYOUT_LOG`, then `RUST_LOG`, then `warn`.
fn resolve_env_filter() -> EnvFilter {
    if let Ok(level) = std::env::var("PAYOUT_LOG") {
        if let Ok(filter) = EnvFilter::try_new(level) {
            return filter;
        }
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(resolve_env_filter())
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let json = cli.json;

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Upload { file, panel } => cli::upload::run(&file, panel.as_deref(), json),
        Commands::Generate {
            from_date,
            to_date,
            merchants,
            percents,
            panel,
            summary_only,
        } => cli::generate::run(
            GenerateArgs {
                from_date,
                to_date,
                merchants,
                percents,
                panel,
                summary_only,
            },
            json,
        ),
        Commands::Merchants { panel } => cli::merchants::run(panel.as_deref()),
        Commands::History { command } => match command {
            HistoryCommands::Uploads { panel, limit } => cli::history::uploads(panel.as_deref(), limit, json),
            HistoryCommands::Reports { panel, limit } => cli::history::reports(panel.as_deref(), limit, json),
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        tracing::debug!(status = e.status_code(), "request failed");
        if json {
            let body = ErrorResponse::from(&e);
            match serde_json::to_string_pretty(&body) {
                Ok(text) => println!("{text}"),
                Err(_) => eprintln!("Error: {e}"),
            }
        } else {
            eprintln!("Error: {e}");
        }
        std::process::exit(1);
    }
}
