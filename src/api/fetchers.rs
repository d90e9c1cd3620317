use super::source::{PageSession, RemoteSource};
use crate::config::SyncSettings;
use crate::core::progress::ProgressSender;
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::model::common::{ExternalAccountId, ListKind};
use crate::model::record::RawRecord;
use crate::transform::page::{self, ListTotals};
use crate::utils;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;

/// Page count and item count of one list, read off its first page.
pub async fn list_totals(
    source: &dyn RemoteSource,
    settings: &SyncSettings,
    session_sem: &Arc<Semaphore>,
    external_id: ExternalAccountId,
    kind: ListKind,
) -> AppResult<ListTotals> {
    let url = settings.page_url(external_id, kind, 1);
    let permit = utils::acquire_permit(session_sem, "List Totals").await?;
    let html = read_page(source, settings, &url, false).await;
    drop(permit);

    let html = html.map_err(|e| match e {
        AppError::RemoteUnavailable(_) | AppError::ParseError { .. } => e,
        other => AppError::RemoteUnavailable(format!(
            "Totals [{}/{}]: {}",
            external_id, kind, other
        )),
    })?;

    let totals = utils::run_cpu_intensive(move || page::extract_totals(&html, kind)).await??;
    log(
        LogLevel::Info,
        &format!(
            "Totals [{}/{}]: {} page(s), {} item(s).",
            external_id, kind, totals.pages, totals.items
        ),
    );
    Ok(totals)
}

/// Loads one list page, lets lazy content settle, and parses its items.
pub async fn fetch_page(
    source: &dyn RemoteSource,
    settings: &SyncSettings,
    session_sem: &Arc<Semaphore>,
    external_id: ExternalAccountId,
    kind: ListKind,
    page_num: u32,
) -> AppResult<Vec<RawRecord>> {
    let url = settings.page_url(external_id, kind, page_num);
    let permit = utils::acquire_permit(session_sem, "Page Fetch").await?;
    let html = read_page(source, settings, &url, true).await;
    drop(permit);

    let html = html.map_err(|e| e.into_fetch(kind, page_num))?;
    utils::run_cpu_intensive(move || page::parse_page_records(&html, kind))
        .await
        .map_err(|e| e.into_fetch(kind, page_num))
}

async fn read_page(
    source: &dyn RemoteSource,
    settings: &SyncSettings,
    url: &str,
    settle: bool,
) -> AppResult<String> {
    let mut session = source.open(url).await?;
    let result = async {
        if settle {
            scroll_to_end(session.as_mut(), settings).await?;
        }
        session.content().await
    }
    .await;

    if let Err(e) = session.close().await {
        log(
            LogLevel::Warning,
            &format!("Closing page session for {} failed: {}", url, e),
        );
    }
    result
}

/// Scrolls in fixed steps until the document end or the step cap, whichever
/// comes first. Returns the number of steps taken.
async fn scroll_to_end(session: &mut dyn PageSession, settings: &SyncSettings) -> AppResult<u32> {
    for step in 1..=settings.scroll_max_steps {
        if session.scroll_by(settings.scroll_step_px).await? {
            return Ok(step);
        }
        sleep(settings.scroll_delay).await;
    }
    log(
        LogLevel::Info,
        &format!(
            "Scroll cap of {} steps reached before document end.",
            settings.scroll_max_steps
        ),
    );
    Ok(settings.scroll_max_steps)
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Records ordered by list kind, then page number, then position on the page.
    pub records: Vec<RawRecord>,
    pub pages_ok: usize,
    pub pages_failed: usize,
}

/// Fetches every page of every planned list concurrently. A page that fails
/// is logged and contributes nothing; it never aborts the others.
pub async fn fetch_all_pages(
    source: Arc<dyn RemoteSource>,
    settings: Arc<SyncSettings>,
    session_sem: Arc<Semaphore>,
    external_id: ExternalAccountId,
    plan: &[(ListKind, u32)],
    progress: ProgressSender,
) -> FetchOutcome {
    let mut tasks = JoinSet::new();

    for &(kind, total_pages) in plan {
        for page_num in 1..=total_pages {
            let source_c = source.clone();
            let settings_c = settings.clone();
            let sem_c = session_sem.clone();
            let progress_c = progress.clone();

            tasks.spawn(async move {
                let result = fetch_page(
                    source_c.as_ref(),
                    &settings_c,
                    &sem_c,
                    external_id,
                    kind,
                    page_num,
                )
                .await;
                if let Ok(records) = &result {
                    progress_c.page_done(records.len());
                }
                (kind, page_num, result)
            });
        }
    }
    drop(progress);

    let mut by_page: BTreeMap<(ListKind, u32), Vec<RawRecord>> = BTreeMap::new();
    let mut outcome = FetchOutcome::default();

    while let Some(join_result) = tasks.join_next().await {
        match join_result {
            Ok((kind, page_num, Ok(records))) => {
                outcome.pages_ok += 1;
                by_page.insert((kind, page_num), records);
            }
            Ok((_, _, Err(e))) => {
                log(LogLevel::Warning, &format!("{} - contributing 0 records.", e));
                outcome.pages_failed += 1;
            }
            Err(e) => {
                log(
                    LogLevel::Error,
                    &format!("Page fetch task panicked: {}", e),
                );
                outcome.pages_failed += 1;
            }
        }
    }

    outcome.records = by_page.into_values().flatten().collect();
    outcome
}
