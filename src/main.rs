use std::fs::File;
use std::io::{self, BufWriter};

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod cohort;
mod config;
mod db;
mod error;
mod export;
mod import;
mod models;
mod report;

use config::{Cli, Config, Output};
use db::Store;

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbose >= 2)
        .init();
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let mut store = Store::open(&config.database, config.run_import)
        .await
        .with_context(|| format!("failed to open database {}", config.database.display()))?;
    db::ensure_schema(&mut store)
        .await
        .context("failed to create tables")?;

    if config.run_import {
        info!("importing customers");
        import::import_customers(&mut store, &config.customers, &config.import)
            .await
            .with_context(|| format!("failed to import {}", config.customers.display()))?;
        info!("importing orders");
        import::import_orders(&mut store, &config.orders, &config.import)
            .await
            .with_context(|| format!("failed to import {}", config.orders.display()))?;
    }

    let rows = cohort::generate_report(&mut store)
        .await
        .context("failed to aggregate cohorts")?;
    debug!(rows = rows.len(), "report assembled");

    match &config.output {
        Output::Stdout => export::write_report(io::stdout().lock(), &rows)?,
        Output::File(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            export::write_report(BufWriter::new(file), &rows)?;
            info!("report written to {}", path.display());
        }
    }

    info!("done");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::from_cli(cli);
    debug!(?config, "configuration loaded");
    run(&config).await
}
