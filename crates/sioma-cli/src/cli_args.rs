use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sioma_core::DisplayTimezone;
use sioma_dashboard::{DateRangeSelection, FilterSelection};
use sioma_store::{
    DEFAULT_COLLECTION, DEFAULT_LOCAL_KEY_PATH, DEFAULT_SECRETS_KEY, DEFAULT_SECRETS_PATH,
    JSON_SECRET_ENV,
};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_calendar_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|error| format!("expected YYYY-MM-DD: {error}"))
}

fn parse_display_timezone(value: &str) -> Result<DisplayTimezone, String> {
    value.parse::<DisplayTimezone>().map_err(|error| error.to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "sioma",
    about = "Worker check-in/check-out dashboard over the SIOMA event log",
    version
)]
pub struct Cli {
    #[arg(
        long = "credentials-file",
        env = "SIOMA_CREDENTIALS_FILE",
        default_value = DEFAULT_LOCAL_KEY_PATH,
        help = "Local service-account key file tried first"
    )]
    pub credentials_file: PathBuf,

    #[arg(
        long = "secrets-file",
        env = "SIOMA_SECRETS_FILE",
        default_value = DEFAULT_SECRETS_PATH,
        help = "Secrets TOML file holding the service account as a table or JSON string"
    )]
    pub secrets_file: PathBuf,

    #[arg(
        long = "secret-key",
        env = "SIOMA_SECRET_KEY",
        default_value = DEFAULT_SECRETS_KEY,
        help = "Key of the service-account entry inside the secrets file"
    )]
    pub secret_key: String,

    #[arg(
        long = "service-account-json",
        env = JSON_SECRET_ENV,
        hide_env_values = true,
        help = "Service-account JSON document passed as a string"
    )]
    pub service_account_json: Option<String>,

    #[arg(
        long = "project-id",
        env = "SIOMA_PROJECT_ID",
        help = "Firestore project id; overrides the credential's project"
    )]
    pub project_id: Option<String>,

    #[arg(
        long = "access-token",
        env = "SIOMA_ACCESS_TOKEN",
        hide_env_values = true,
        help = "OAuth bearer token sent to the Firestore REST API"
    )]
    pub access_token: Option<String>,

    #[arg(
        long = "firestore-base-url",
        env = "SIOMA_FIRESTORE_BASE_URL",
        help = "Firestore REST base URL, e.g. an emulator at http://127.0.0.1:8080"
    )]
    pub firestore_base_url: Option<String>,

    #[arg(
        long = "fixture",
        env = "SIOMA_FIXTURE",
        help = "Read events from a JSON export instead of Firestore"
    )]
    pub fixture: Option<PathBuf>,

    #[arg(
        long = "collection",
        env = "SIOMA_COLLECTION",
        default_value = DEFAULT_COLLECTION,
        help = "Event collection name"
    )]
    pub collection: String,

    #[arg(
        long = "timezone",
        env = "SIOMA_TIMEZONE",
        default_value = "local",
        value_parser = parse_display_timezone,
        help = "Display timezone: IANA name or 'local'"
    )]
    pub timezone: DisplayTimezone,

    #[arg(
        long = "log-level",
        env = "SIOMA_LOG_LEVEL",
        help = "Tracing filter directive; defaults to RUST_LOG or 'warn'"
    )]
    pub log_level: Option<String>,

    #[arg(long, global = true, help = "Emit JSON instead of text")]
    pub json: bool,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    #[arg(
        long = "worker",
        global = true,
        help = "Restrict to this worker; repeatable. Defaults to every worker"
    )]
    pub workers: Vec<String>,

    #[arg(
        long = "no-workers",
        global = true,
        conflicts_with = "workers",
        help = "Select no workers at all"
    )]
    pub no_workers: bool,

    #[arg(
        long = "event-type",
        global = true,
        help = "Restrict to this event type; repeatable. Defaults to every type"
    )]
    pub event_types: Vec<String>,

    #[arg(
        long = "date",
        global = true,
        value_parser = parse_calendar_date,
        help = "Date range bound (YYYY-MM-DD); pass twice for start and end"
    )]
    pub dates: Vec<NaiveDate>,
}

impl FilterArgs {
    pub fn to_selection(&self) -> FilterSelection {
        let workers = if self.no_workers {
            Some(BTreeSet::new())
        } else if self.workers.is_empty() {
            None
        } else {
            Some(self.workers.iter().cloned().collect())
        };
        let event_types =
            (!self.event_types.is_empty()).then(|| self.event_types.iter().cloned().collect());
        let date_range = if self.dates.is_empty() {
            DateRangeSelection::FullSpan
        } else {
            DateRangeSelection::Dates(self.dates.clone())
        };
        FilterSelection {
            workers,
            event_types,
            date_range,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// KPI counts, distributions and daily activity (default).
    Summary {
        #[arg(long, help = "Write the JSON report to this path instead of stdout")]
        output: Option<PathBuf>,
    },
    /// Filtered event rows, newest first.
    Events {
        #[arg(long, help = "Print at most this many rows")]
        limit: Option<usize>,
    },
    /// Distinct workers, event types and the observed date span.
    Facets,
    /// Re-run the dashboard on an interval until interrupted.
    Watch {
        #[arg(
            long = "interval-secs",
            default_value_t = 30,
            value_parser = parse_positive_u64
        )]
        interval_secs: u64,
    },
}
