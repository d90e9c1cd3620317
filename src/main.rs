use clap::{CommandFactory, Parser};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Builder;
use watchlist_sync::api::client::HttpSource;
use watchlist_sync::cli::{CliArgs, Command};
use watchlist_sync::core::data_store::CatalogStore;
use watchlist_sync::core::processor::SyncEngine;
use watchlist_sync::core::progress::LogProgressSink;
use watchlist_sync::core::stats;
use watchlist_sync::db::SqliteCatalogStore;
use watchlist_sync::error::{AppError, AppResult};
use watchlist_sync::io;
use watchlist_sync::logging::{log, setup_logging, LogLevel};
use watchlist_sync::model::catalog::CatalogItem;
use watchlist_sync::model::common::{ExternalAccountId, LinkStatus};
use watchlist_sync::testing;

fn main() -> ExitCode {
    setup_logging();

    let cli_args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.use_stderr() {
                log(LogLevel::Error, &format!("CLI Argument Error: {}", e));
                let _ = CliArgs::command().print_help();
                return ExitCode::from(2);
            }
            // --help and --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let runtime = match Builder::new_multi_thread()
        .enable_all()
        .thread_name("sync-worker")
        .worker_threads(num_cpus::get())
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log(
                LogLevel::Error,
                &format!("FATAL: Failed to build Tokio runtime: {}", e),
            );
            return ExitCode::FAILURE;
        }
    };

    let main_result: AppResult<i32> = runtime.block_on(run(cli_args));

    match main_result {
        Ok(exit_code) => ExitCode::from(exit_code as u8),
        Err(e) if e.is_argument() => {
            log(LogLevel::Error, &e.to_string());
            ExitCode::from(2)
        }
        Err(e) => {
            log(LogLevel::Error, &format!("FATAL ERROR: {}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> AppResult<i32> {
    let settings = args.get_settings()?;

    if let Command::ParseFile { path, kind, output } = &args.command {
        testing::parse_saved_page(path, *kind, output.clone()).await?;
        return Ok(0);
    }
    if let Command::Search { query, json } = &args.command {
        let store = SqliteCatalogStore::connect(args.get_database_url()).await?;
        let items = store.search_titles(query).await?;
        if items.is_empty() {
            log(LogLevel::Info, &format!("No catalog items match '{}'.", query.trim()));
        }
        print_items(&items, *json)?;
        store.close().await;
        return Ok(0);
    }
    let external_id = args
        .command
        .get_external_id()
        .ok_or_else(|| AppError::Unexpected("Subcommand carries no account".to_string()))??;

    let store = SqliteCatalogStore::connect(args.get_database_url()).await?;
    let exit_code = match &args.command {
        Command::Register { username, .. } => {
            let account = store
                .register_account(external_id, username.as_deref())
                .await?;
            log(
                LogLevel::Success,
                &format!(
                    "Account {} registered as #{}{}",
                    account.external_id,
                    account.id,
                    account
                        .username
                        .as_deref()
                        .map(|u| format!(" ({})", u))
                        .unwrap_or_default()
                ),
            );
            0
        }
        Command::Counts { .. } => print_counts(&store, external_id).await?,
        Command::Sync { json, report, .. } => {
            let started = Instant::now();
            let account = store.register_account(external_id, None).await?;
            let engine = SyncEngine::new(
                Arc::new(store.clone()),
                Arc::new(HttpSource::new()?),
                settings,
            );
            let result = engine
                .sync(account.id, account.external_id, Arc::new(LogProgressSink))
                .await?;

            if *json {
                println!("{}", io::to_json_pretty(&result)?);
            } else {
                stats::print_summary(&result, external_id, started.elapsed());
            }
            if let Some(path) = report {
                io::save_json(path.clone(), result.clone(), "sync report".to_string()).await?;
            }
            stats::determine_exit_code(&result)
        }
        Command::Random { count, json, .. } => {
            match store.find_account(external_id).await? {
                Some(account) => {
                    let items = store.random_pending(account.id, *count).await?;
                    if items.is_empty() {
                        log(
                            LogLevel::Warning,
                            &format!("Account {} has no pending items.", external_id),
                        );
                    }
                    print_items(&items, *json)?;
                    0
                }
                None => {
                    log(
                        LogLevel::Warning,
                        &format!("Account {} is not registered.", external_id),
                    );
                    1
                }
            }
        }
        Command::Search { .. } | Command::ParseFile { .. } => 0,
    };

    store.close().await;
    Ok(exit_code)
}

async fn print_counts(store: &SqliteCatalogStore, external_id: ExternalAccountId) -> AppResult<i32> {
    let Some(account) = store.find_account(external_id).await? else {
        log(
            LogLevel::Warning,
            &format!("Account {} is not registered.", external_id),
        );
        return Ok(1);
    };

    for status in [LinkStatus::Pending, LinkStatus::Completed] {
        let n = store.count_by_status(account.id, status).await?;
        println!("{:<10} {}", status, n);
    }
    Ok(0)
}

fn print_items(items: &[CatalogItem], json: bool) -> AppResult<()> {
    if json {
        println!("{}", io::to_json_pretty(&items)?);
        return Ok(());
    }
    for item in items {
        let year = item
            .release_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "????".to_string());
        match &item.original_title {
            Some(original) => println!("{:>6}  {}  {}  ({})", item.id, year, item.title, original),
            None => println!("{:>6}  {}  {}", item.id, year, item.title),
        }
    }
    Ok(())
}
