use crate::api::fetchers;
use crate::api::source::RemoteSource;
use crate::config::SyncSettings;
use crate::core::data_store::CatalogStore;
use crate::core::progress::{progress_channel, ProgressEnd, ProgressSink};
use crate::core::stats::{MergeTally, SyncResult};
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::model::catalog::LinkUpsert;
use crate::model::common::{AccountId, ExternalAccountId, ItemId, LinkStatus, ListKind};
use crate::model::record::{KeyedRecord, NaturalKey, RawRecord};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Counting,
    Skipped,
    Fetching,
    Merging,
    Done,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Idle => "IDLE",
            SyncPhase::Counting => "COUNTING",
            SyncPhase::Skipped => "SKIPPED",
            SyncPhase::Fetching => "FETCHING",
            SyncPhase::Merging => "MERGING",
            SyncPhase::Done => "DONE",
            SyncPhase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

struct PhaseLog {
    external_id: ExternalAccountId,
    current: SyncPhase,
    entered_at: Instant,
}

impl PhaseLog {
    fn new(external_id: ExternalAccountId) -> Self {
        PhaseLog {
            external_id,
            current: SyncPhase::Idle,
            entered_at: Instant::now(),
        }
    }

    fn advance(&mut self, next: SyncPhase) {
        let level = match next {
            SyncPhase::Failed => LogLevel::Error,
            SyncPhase::Done | SyncPhase::Skipped => LogLevel::Success,
            _ => LogLevel::Step,
        };
        log(
            level,
            &format!(
                "--- Sync [{}]: {} -> {} (after {:.3?}) ---",
                self.external_id,
                self.current,
                next,
                self.entered_at.elapsed()
            ),
        );
        self.current = next;
        self.entered_at = Instant::now();
    }
}

/// One list whose remote total differs from what is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListPlan {
    pub kind: ListKind,
    pub pages: u32,
    pub remote_items: u64,
    pub stored_items: u64,
}

/// Keeps an account's catalog links in line with its remote lists.
///
/// The session semaphore is shared by the totals lookups and the page fetches,
/// so at most `max_page_concurrency` remote sessions are ever open at once for
/// this engine.
pub struct SyncEngine {
    store: Arc<dyn CatalogStore>,
    source: Arc<dyn RemoteSource>,
    settings: Arc<SyncSettings>,
    session_sem: Arc<Semaphore>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        source: Arc<dyn RemoteSource>,
        settings: SyncSettings,
    ) -> Self {
        let permits = settings.max_page_concurrency.max(1);
        SyncEngine {
            store,
            source,
            settings: Arc::new(settings),
            session_sem: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub async fn sync(
        &self,
        account_id: AccountId,
        external_id: ExternalAccountId,
        sink: Arc<dyn ProgressSink>,
    ) -> AppResult<SyncResult> {
        let mut phase = PhaseLog::new(external_id);
        let result = self.run_phases(&mut phase, account_id, external_id, sink).await;
        match &result {
            Ok(r) if r.skipped => {}
            Ok(_) => phase.advance(SyncPhase::Done),
            Err(e) => {
                log(LogLevel::Error, &format!("Sync [{}] aborted: {}", external_id, e));
                phase.advance(SyncPhase::Failed);
            }
        }
        result
    }

    async fn run_phases(
        &self,
        phase: &mut PhaseLog,
        account_id: AccountId,
        external_id: ExternalAccountId,
        sink: Arc<dyn ProgressSink>,
    ) -> AppResult<SyncResult> {
        phase.advance(SyncPhase::Counting);
        let plan = self.plan_lists(account_id, external_id).await?;
        if plan.is_empty() {
            phase.advance(SyncPhase::Skipped);
            return Ok(SyncResult::skipped());
        }

        phase.advance(SyncPhase::Fetching);
        let target: u64 = plan.iter().map(|p| p.remote_items).sum();
        let page_plan: Vec<(ListKind, u32)> = plan.iter().map(|p| (p.kind, p.pages)).collect();
        let total_pages: u32 = page_plan.iter().map(|(_, pages)| *pages).sum();
        log(
            LogLevel::Info,
            &format!(
                "Fetching {} page(s) across {} list(s), expecting {} item(s)...",
                total_pages,
                plan.len(),
                target
            ),
        );

        let (progress_tx, reporter) =
            progress_channel(target, self.settings.progress_idle_timeout, sink);
        let reporter_task = tokio::spawn(reporter.run());

        let outcome = fetchers::fetch_all_pages(
            self.source.clone(),
            self.settings.clone(),
            self.session_sem.clone(),
            external_id,
            &page_plan,
            progress_tx,
        )
        .await;

        let progress = reporter_task.await?;
        if progress.end != ProgressEnd::TargetReached {
            log(
                LogLevel::Warning,
                &format!(
                    "Retrieved {} of {} expected item(s) ({:?}).",
                    progress.done, progress.target, progress.end
                ),
            );
        }
        log(
            if outcome.pages_failed > 0 {
                LogLevel::Warning
            } else {
                LogLevel::Success
            },
            &format!(
                "Pages fetched: {} OK, {} failed, {} record(s).",
                outcome.pages_ok,
                outcome.pages_failed,
                outcome.records.len()
            ),
        );

        phase.advance(SyncPhase::Merging);
        let (keyed, discarded) = dedup_records(outcome.records);
        if discarded > 0 {
            log(
                LogLevel::Warning,
                &format!("Discarded {} record(s) without a title.", discarded),
            );
        }
        let totals = self.merge_all(account_id, &keyed).await?;

        Ok(SyncResult {
            items_processed: keyed.len() as u64,
            skipped: false,
            new_items: totals.new_items,
            links_written: totals.links_written,
            pages_ok: outcome.pages_ok,
            failed_pages: outcome.pages_failed,
            discarded_records: discarded,
        })
    }

    /// Reads both remote totals and both stored counts at once and returns the
    /// lists that need a refresh. Empty means nothing changed.
    pub async fn plan_lists(
        &self,
        account_id: AccountId,
        external_id: ExternalAccountId,
    ) -> AppResult<Vec<ListPlan>> {
        let source = self.source.as_ref();
        let settings = self.settings.as_ref();
        let sem = &self.session_sem;

        let (pending_totals, completed_totals, stored_pending, stored_completed) = futures::try_join!(
            fetchers::list_totals(source, settings, sem, external_id, ListKind::Pending),
            fetchers::list_totals(source, settings, sem, external_id, ListKind::Completed),
            self.store.count_by_status(account_id, LinkStatus::Pending),
            self.store.count_by_status(account_id, LinkStatus::Completed),
        )?;

        let candidates = [
            (ListKind::Pending, pending_totals, stored_pending),
            (ListKind::Completed, completed_totals, stored_completed),
        ];
        let plan: Vec<ListPlan> = candidates
            .into_iter()
            .filter(|(_, totals, stored)| totals.items != *stored)
            .map(|(kind, totals, stored)| ListPlan {
                kind,
                pages: totals.pages,
                remote_items: totals.items,
                stored_items: stored,
            })
            .collect();

        for p in &plan {
            log(
                LogLevel::Info,
                &format!(
                    "List [{}] changed: {} remote vs {} stored item(s), {} page(s) to fetch.",
                    p.kind, p.remote_items, p.stored_items, p.pages
                ),
            );
        }
        Ok(plan)
    }

    async fn merge_all(&self, account_id: AccountId, records: &[KeyedRecord]) -> AppResult<MergeTally> {
        let batch_size = self.settings.merge_batch_size.max(1);
        let batch_count = records.len().div_ceil(batch_size);
        let mut totals = MergeTally::default();

        for (idx, batch) in records.chunks(batch_size).enumerate() {
            let tally = self.merge_batch(account_id, batch).await.map_err(|e| {
                log(
                    LogLevel::Error,
                    &format!(
                        "Merge batch {}/{} rolled back; {} earlier batch(es) stay committed.",
                        idx + 1,
                        batch_count,
                        idx
                    ),
                );
                e
            })?;
            log(
                LogLevel::Info,
                &format!(
                    "Merge batch {}/{}: {} record(s), {} new item(s), {} link(s) written.",
                    idx + 1,
                    batch_count,
                    batch.len(),
                    tally.new_items,
                    tally.links_written
                ),
            );
            totals.add(tally);
        }
        Ok(totals)
    }

    /// Lookup, insert and link upsert for one batch, inside one transaction.
    async fn merge_batch(&self, account_id: AccountId, batch: &[KeyedRecord]) -> AppResult<MergeTally> {
        let mut tx = self.store.begin_batch().await?;

        let keys: Vec<NaturalKey> = batch.iter().map(|r| r.key.clone()).collect();
        let mut item_ids: HashMap<NaturalKey, ItemId> = tx
            .find_by_natural_key(&keys)
            .await?
            .into_iter()
            .map(|item| (item.natural_key(), item.id))
            .collect();

        let unmatched: Vec<&KeyedRecord> = batch
            .iter()
            .filter(|r| !item_ids.contains_key(&r.key))
            .collect();
        let new_rows: Vec<RawRecord> = unmatched.iter().map(|r| r.record.clone()).collect();
        let new_ids = tx.insert_new(&new_rows).await?;
        if new_ids.len() != new_rows.len() {
            return Err(AppError::StoreError(format!(
                "Expected {} new id(s), store returned {}",
                new_rows.len(),
                new_ids.len()
            )));
        }
        for (record, id) in unmatched.iter().zip(&new_ids) {
            item_ids.insert(record.key.clone(), *id);
        }

        let links = batch
            .iter()
            .map(|r| {
                item_ids
                    .get(&r.key)
                    .map(|id| LinkUpsert::new(*id, r.record.personal_rating))
                    .ok_or_else(|| {
                        AppError::Unexpected(format!("No catalog id resolved for '{}'", r.key.title))
                    })
            })
            .collect::<AppResult<Vec<_>>>()?;
        let links_written = tx.upsert_links(account_id, &links).await?;
        tx.commit().await?;

        Ok(MergeTally {
            new_items: new_ids.len() as u64,
            links_written,
        })
    }
}

/// Drops untitled records and collapses natural-key duplicates, keeping first
/// appearance order. A rated duplicate replaces an unrated one. Returns the
/// surviving records and how many untitled records were dropped.
pub fn dedup_records(records: Vec<RawRecord>) -> (Vec<KeyedRecord>, usize) {
    let mut discarded = 0;
    let mut kept: Vec<KeyedRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<NaturalKey, usize> = HashMap::with_capacity(records.len());

    for record in records {
        let Some(keyed) = KeyedRecord::from_raw(record) else {
            discarded += 1;
            continue;
        };
        match index.get(&keyed.key) {
            Some(&pos) => {
                let existing = &mut kept[pos];
                if existing.record.personal_rating.is_none()
                    && keyed.record.personal_rating.is_some()
                {
                    *existing = keyed;
                }
            }
            None => {
                index.insert(keyed.key.clone(), kept.len());
                kept.push(keyed);
            }
        }
    }
    (kept, discarded)
}
