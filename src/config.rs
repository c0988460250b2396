use std::path::PathBuf;

use chrono_tz::Tz;
use clap::{ArgAction, Parser};
use tracing::warn;

use crate::import::ImportSettings;

#[derive(Debug, Parser)]
#[command(name = "cohort-retention")]
#[command(about = "Weekly cohort retention report from customer and order csv exports", long_about = None)]
pub struct Cli {
    /// SQLite database file holding imported customers and orders
    #[arg(long, default_value = "./cohort-analysis.db")]
    pub db: PathBuf,
    /// Customer csv with `id,created` columns
    #[arg(long, default_value = "./data/customers.csv")]
    pub customers: PathBuf,
    /// Order csv with `id,order_number,user_id,created` columns
    #[arg(long, default_value = "./data/orders.csv")]
    pub orders: PathBuf,
    /// chrono format of the UTC timestamps in both csv files
    #[arg(long, default_value = "%Y-%m-%d %H:%M:%S")]
    pub datetime_format: String,
    /// IANA timezone the timestamps are converted into before bucketing
    #[arg(long, default_value = "UTC")]
    pub timezone: String,
    /// Rebuild the database from the csv files before reporting
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub import: bool,
    #[arg(long, default_value = "./results.csv")]
    pub output: PathBuf,
    /// Write the report to stdout instead of --output
    #[arg(long)]
    pub stdout: bool,
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    pub customers: PathBuf,
    pub orders: PathBuf,
    pub import: ImportSettings,
    pub run_import: bool,
    pub output: Output,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Self {
        let output = if cli.stdout {
            Output::Stdout
        } else {
            Output::File(cli.output)
        };

        Self {
            database: cli.db,
            customers: cli.customers,
            orders: cli.orders,
            import: ImportSettings {
                datetime_format: cli.datetime_format,
                timezone: resolve_timezone(&cli.timezone),
            },
            run_import: cli.import,
            output,
        }
    }
}

/// Unknown zone names fall back to UTC.
pub fn resolve_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(err) => {
            warn!("failed to load timezone {name:?} ({err}); using UTC");
            Tz::UTC
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_surface() {
        let config = Config::from_cli(Cli::parse_from(["cohort-retention"]));

        assert_eq!(config.database, PathBuf::from("./cohort-analysis.db"));
        assert_eq!(config.customers, PathBuf::from("./data/customers.csv"));
        assert_eq!(config.orders, PathBuf::from("./data/orders.csv"));
        assert_eq!(config.import.datetime_format, "%Y-%m-%d %H:%M:%S");
        assert_eq!(config.import.timezone, Tz::UTC);
        assert!(config.run_import);
        assert_eq!(config.output, Output::File(PathBuf::from("./results.csv")));
    }

    #[test]
    fn parses_flags() {
        let config = Config::from_cli(Cli::parse_from([
            "cohort-retention",
            "--import",
            "false",
            "--stdout",
            "--timezone",
            "Europe/Oslo",
        ]));

        assert!(!config.run_import);
        assert_eq!(config.output, Output::Stdout);
        assert_eq!(config.import.timezone, chrono_tz::Europe::Oslo);
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        assert_eq!(resolve_timezone("Mars/Olympus_Mons"), Tz::UTC);
        assert_eq!(resolve_timezone("Asia/Tokyo"), chrono_tz::Asia::Tokyo);
    }
}
