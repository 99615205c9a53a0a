use crate::config::AppConfig;
use crate::db::{init_db, latest_collection_date, load_listings, Database, ListingQuery};
use crate::errors::AppError;
use crate::notify::TelegramNotifier;
use crate::pipeline::ReportRange;
use crate::region::{resolve, resolve_all, RegionTable};
use crate::scraper::{Collector, NaverLandClient};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod analytics;
mod config;
mod db;
mod domain;
mod errors;
mod logging;
mod notify;
mod pipeline;
mod region;
mod scraper;
mod spreadsheets;

#[cfg(test)]
mod tests;

#[derive(Parser)]
#[command(name = "land_scraper")]
#[command(about = "Collect Naver Land listings by region and report prices per size bracket")]
struct Cli {
    /// Debug logging for this crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect listings for every REGION_NAME and store them
    Collect,

    /// Analyze stored listings and send the report
    Report {
        /// Print the messages instead of sending them
        #[arg(long)]
        dry_run: bool,

        /// First collection date to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last collection date to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Show how region names resolve against the reference table
    Resolve {
        /// Region name(s), comma separated
        name: String,
    },

    /// Export stored listings of one region to an .xlsx file
    Export {
        /// Region code or name
        #[arg(long)]
        region: String,

        #[arg(long)]
        out: PathBuf,

        /// Collection date, defaults to the latest one
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "command failed");
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

fn open_db(config: &AppConfig) -> Result<Database, AppError> {
    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::BadRequest(format!("Cannot create {}: {e}", parent.display())))?;
        }
    }
    let db = Database::new(config.database_path.clone());
    init_db(&db)?;
    Ok(db)
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = AppConfig::from_env()?;

    match cli.command {
        Commands::Collect => {
            if config.regions.is_empty() {
                return Err(AppError::BadRequest("REGION_NAME is not set".into()));
            }
            let table = RegionTable::load(&config.region_table_path)?;
            let db = open_db(&config)?;
            let client = NaverLandClient::new(config.timeout)?;
            let mut collector =
                Collector::new(client, config.request_policy(), config.collector_options());

            let today = Local::now().date_naive();
            let outcomes = pipeline::run_collection(&config, &table, &mut collector, &db, today);

            for o in &outcomes {
                let code = o.region.as_ref().map_or("-", |r| r.code.as_str());
                match (&o.status, &o.error) {
                    (Some(status), None) => println!("✅ {} [{code}] {status}: {} listings", o.label, o.saved),
                    (Some(status), Some(why)) => {
                        println!("⚠️ {} [{code}] {status}: {} listings ({why})", o.label, o.saved)
                    }
                    (None, why) => println!("❌ {} [{code}]: {}", o.label, why.as_deref().unwrap_or("failed")),
                }
            }

            if outcomes.iter().all(|o| o.status.is_none()) {
                return Err(AppError::BadRequest("no region could be collected".into()));
            }
        }

        Commands::Report { dry_run, from, to } => {
            let table = RegionTable::load(&config.region_table_path)?;
            let db = open_db(&config)?;
            let messages = pipeline::build_report_messages(
                &config,
                &table,
                &db,
                ReportRange { from, to },
                Local::now().naive_local(),
            )?;

            if dry_run {
                for message in &messages {
                    println!("{message}");
                }
            } else {
                let notifier = TelegramNotifier::new(
                    config.telegram_bot_token.clone().unwrap_or_default(),
                    config.telegram_chat_id.clone().unwrap_or_default(),
                )?;
                pipeline::deliver(&notifier, &messages)?;
                println!("✅ {} message(s) sent", messages.len());
            }
        }

        Commands::Resolve { name } => {
            let table = RegionTable::load(&config.region_table_path)?;
            for (label, result) in resolve_all(&table, &name) {
                match result {
                    Ok(r) => println!(
                        "{label} → {} ({}) [{:.4}, {:.4}]{}",
                        r.code,
                        r.matched_name,
                        r.center_lat,
                        r.center_lon,
                        if r.is_partial_match() { " (partial)" } else { "" }
                    ),
                    Err(e) => println!("{label} → {e}"),
                }
            }
        }

        Commands::Export { region, out, date } => {
            let db = open_db(&config)?;
            let code = match RegionTable::load(&config.region_table_path) {
                Ok(table) => resolve(&table, &region).map(|r| r.code).unwrap_or(region),
                Err(_) => region,
            };

            let date = match date {
                Some(d) => d,
                None => latest_collection_date(&db, &code)?
                    .ok_or_else(|| AppError::BadRequest(format!("No stored listings for {code}")))?,
            };

            let loaded = load_listings(
                &db,
                &ListingQuery {
                    region_codes: vec![code.clone()],
                    from: Some(date),
                    to: Some(date),
                },
            )?;
            spreadsheets::export_listings_xlsx(&loaded.listings, &out)?;
            println!("✅ {} listings of {code} ({date}) → {}", loaded.listings.len(), out.display());
        }
    }

    Ok(())
}
