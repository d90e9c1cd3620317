use crate::config::{self, SyncSettings};
use crate::error::{AppError, AppResult};
use crate::model::common::{ExternalAccountId, ListKind};
use crate::utils;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Mirrors an account's watchlist and rated list into a local catalog.",
    long_about = None,
    arg_required_else_help = true
)]
pub struct CliArgs {
    #[arg(
        long,
        global = true,
        default_value = config::DEFAULT_DATABASE_URL,
        value_name = "URL",
        help = "SQLite database URL (created if missing)"
    )]
    db: String,

    #[arg(
        long,
        global = true,
        default_value = config::DEFAULT_BASE_URL,
        value_name = "URL",
        help = "Base URL of the listing service"
    )]
    base_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an account or update its username.
    Register {
        #[arg(value_name = "ID_OR_URL")]
        account: String,
        #[arg(long)]
        username: Option<String>,
    },
    /// Fetch the account's lists and merge them into the catalog.
    Sync {
        #[arg(value_name = "ID_OR_URL")]
        account: String,
        #[arg(
            long,
            default_value_t = config::MAX_PAGE_CONCUR,
            help = "Maximum remote page sessions open at once"
        )]
        concurrency: usize,
        #[arg(
            long,
            default_value_t = config::MERGE_BATCH_SIZE,
            help = "Records merged per store transaction"
        )]
        batch_size: usize,
        #[arg(long, help = "Print the result as JSON instead of a summary table")]
        json: bool,
        #[arg(long, value_name = "FILE_PATH", help = "Also write the result as JSON to this file")]
        report: Option<PathBuf>,
    },
    /// Print stored link counts per status.
    Counts {
        #[arg(value_name = "ID_OR_URL")]
        account: String,
    },
    /// Find catalog items whose title or original title contains QUERY.
    Search {
        #[arg(value_name = "QUERY")]
        query: String,
        #[arg(long, help = "Print the items as JSON")]
        json: bool,
    },
    /// Pick random items from the account's pending list.
    Random {
        #[arg(value_name = "ID_OR_URL")]
        account: String,
        #[arg(
            long,
            default_value_t = 1,
            value_parser = clap::value_parser!(u32).range(1..),
            help = "Number of items to pick"
        )]
        count: u32,
        #[arg(long, help = "Print the items as JSON")]
        json: bool,
    },
    /// Parse a saved list page offline and print its records as JSON.
    ParseFile {
        #[arg(value_name = "FILE_PATH")]
        path: PathBuf,
        #[arg(long, value_enum)]
        kind: ListKind,
        #[arg(long, value_name = "OUTPUT_FILE", help = "Write the JSON here instead of stdout")]
        output: Option<PathBuf>,
    },
}

impl CliArgs {
    pub fn get_database_url(&self) -> &str {
        &self.db
    }

    pub fn get_base_url(&self) -> AppResult<&str> {
        let url = self.base_url.trim();
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(url)
        } else {
            Err(AppError::Argument(format!(
                "--base-url must start with http:// or https://, got '{}'",
                url
            )))
        }
    }

    /// Builds engine settings for the `sync` subcommand; other subcommands get
    /// the defaults with only the base URL applied.
    pub fn get_settings(&self) -> AppResult<SyncSettings> {
        let mut settings = SyncSettings {
            base_url: self.get_base_url()?.to_string(),
            ..SyncSettings::default()
        };

        if let Command::Sync {
            concurrency,
            batch_size,
            ..
        } = &self.command
        {
            if *concurrency == 0 {
                return Err(AppError::Argument("--concurrency must be at least 1.".into()));
            }
            if *batch_size == 0 {
                return Err(AppError::Argument("--batch-size must be at least 1.".into()));
            }
            settings.max_page_concurrency = *concurrency;
            settings.merge_batch_size = *batch_size;
        }
        Ok(settings)
    }
}

impl Command {
    /// The external account this subcommand targets, if any.
    pub fn get_external_id(&self) -> Option<AppResult<ExternalAccountId>> {
        match self {
            Command::Register { account, .. }
            | Command::Sync { account, .. }
            | Command::Counts { account }
            | Command::Random { account, .. } => Some(utils::parse_external_account_id(account)),
            Command::Search { .. } | Command::ParseFile { .. } => None,
        }
    }
}
