#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use watchlist_sync::api::source::{PageSession, RemoteSource};
use watchlist_sync::config::SyncSettings;
use watchlist_sync::core::data_store::{CatalogBatch, CatalogStore};
use watchlist_sync::db::SqliteCatalogStore;
use watchlist_sync::error::{AppError, AppResult};
use watchlist_sync::model::catalog::{CatalogItem, LinkUpsert};
use watchlist_sync::model::common::{AccountId, ExternalAccountId, ItemId, LinkStatus, ListKind};
use watchlist_sync::model::record::{NaturalKey, RawRecord};

pub const EXTERNAL_ID: ExternalAccountId = 112144;

pub fn test_settings(concurrency: usize) -> SyncSettings {
    SyncSettings {
        base_url: "http://listing.test".to_string(),
        max_page_concurrency: concurrency,
        merge_batch_size: 3,
        scroll_delay: Duration::from_millis(1),
        scroll_max_steps: 50,
        progress_idle_timeout: Duration::from_secs(5),
        ..SyncSettings::default()
    }
}

pub async fn temp_store() -> (TempDir, SqliteCatalogStore) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("catalog.db").display());
    let store = SqliteCatalogStore::connect(&url).await.unwrap();
    (dir, store)
}

#[derive(Debug, Clone, Copy)]
pub struct Item {
    pub title: Option<&'static str>,
    pub year: Option<i64>,
    pub rating: Option<i64>,
}

pub fn item(title: &'static str, year: i64) -> Item {
    Item {
        title: Some(title),
        year: Some(year),
        rating: None,
    }
}

pub fn rated(title: &'static str, year: i64, rating: i64) -> Item {
    Item {
        title: Some(title),
        year: Some(year),
        rating: Some(rating),
    }
}

pub fn untitled(year: i64) -> Item {
    Item {
        title: None,
        year: Some(year),
        rating: None,
    }
}

fn item_html(kind: ListKind, item: &Item) -> String {
    let status_class = match kind {
        ListKind::Pending => "status_future",
        ListKind::Completed => "status_rated",
    };
    let mut html = format!(r#"<div class="item user-status-list {}">"#, status_class);
    if let Some(title) = item.title {
        let _ = write!(
            html,
            r#"<a class="filmList__item-title" href="/film/{}/"><span class="movie-title__text">{}</span></a>"#,
            title.len(),
            title
        );
    }
    let original = match item.year {
        Some(year) => format!("{} (orig), {}", item.title.unwrap_or("?"), year),
        None => format!("{} (orig)", item.title.unwrap_or("?")),
    };
    let _ = write!(
        html,
        r#"<span class="item__name-orig">{}</span><span class="filmList__extra-info">драма, 1 год 40 хв</span>"#,
        original
    );
    if let Some(rating) = item.rating {
        let _ = write!(html, r#"<span class="myRating number-{}"></span>"#, rating);
    }
    html.push_str("</div>");
    html
}

fn page_html(kind: ListKind, total_items: usize, total_pages: usize, items: &[Item]) -> String {
    let links: String = (1..=total_pages)
        .map(|p| format!(r#"<li><a href="?page={0}">{0}</a></li>"#, p))
        .collect();
    let body: String = items.iter().map(|i| item_html(kind, i)).collect();
    format!(
        r#"<html><body><div class="filmList__count">Фільмів: {}</div><div id="pagesSelect"><ul>{}</ul></div>{}</body></html>"#,
        total_items, links, body
    )
}

/// In-memory listing service. Tracks how many sessions are open at once and
/// can hide content until a session has scrolled far enough.
#[derive(Default)]
pub struct FakeSource {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    pub open_delay: Duration,
    pub scrolls_needed: u32,
    pub open_now: Arc<AtomicUsize>,
    pub max_open: Arc<AtomicUsize>,
    pub opened: Arc<AtomicUsize>,
    pub scrolls: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new() -> Self {
        FakeSource::default()
    }

    /// Registers one list; `pages` holds the items of each page in order. An
    /// empty vector registers a single empty page.
    pub fn with_list(self, settings: &SyncSettings, kind: ListKind, pages: Vec<Vec<Item>>) -> Self {
        self.with_account_list(settings, EXTERNAL_ID, kind, pages)
    }

    pub fn with_account_list(
        mut self,
        settings: &SyncSettings,
        external_id: ExternalAccountId,
        kind: ListKind,
        pages: Vec<Vec<Item>>,
    ) -> Self {
        let pages = if pages.is_empty() { vec![Vec::new()] } else { pages };
        let total_items: usize = pages.iter().map(Vec::len).sum();
        for (idx, items) in pages.iter().enumerate() {
            let url = settings.page_url(external_id, kind, idx as u32 + 1);
            self.pages
                .insert(url, page_html(kind, total_items, pages.len(), items));
        }
        self
    }

    pub fn failing_page(mut self, settings: &SyncSettings, kind: ListKind, page: u32) -> Self {
        self.failing.insert(settings.page_url(EXTERNAL_ID, kind, page));
        self
    }
}

#[async_trait]
impl RemoteSource for FakeSource {
    async fn open(&self, url: &str) -> AppResult<Box<dyn PageSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);

        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }

        if self.failing.contains(url) {
            self.open_now.fetch_sub(1, Ordering::SeqCst);
            return Err(AppError::RemoteUnavailable(format!("HTTP 503 for {}", url)));
        }
        let Some(document) = self.pages.get(url).cloned() else {
            self.open_now.fetch_sub(1, Ordering::SeqCst);
            return Err(AppError::RemoteUnavailable(format!("HTTP 404 for {}", url)));
        };

        Ok(Box::new(FakeSession {
            document,
            scrolls_needed: self.scrolls_needed,
            scrolled: 0,
            open_now: self.open_now.clone(),
            scrolls: self.scrolls.clone(),
        }))
    }
}

struct FakeSession {
    document: String,
    scrolls_needed: u32,
    scrolled: u32,
    open_now: Arc<AtomicUsize>,
    scrolls: Arc<AtomicUsize>,
}

#[async_trait]
impl PageSession for FakeSession {
    async fn scroll_by(&mut self, _step_px: u32) -> AppResult<bool> {
        self.scrolled += 1;
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scrolled >= self.scrolls_needed)
    }

    async fn content(&mut self) -> AppResult<String> {
        // The counter and page selector render eagerly; items only once the
        // viewport has reached the end.
        if self.scrolled >= self.scrolls_needed {
            Ok(self.document.clone())
        } else {
            let cut = self
                .document
                .find(r#"<div class="item"#)
                .unwrap_or(self.document.len());
            Ok(format!("{}</body></html>", &self.document[..cut]))
        }
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        self.open_now.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Wraps the SQLite store and fails the `fail_on`-th `insert_new` call
/// (1-based, counted across batches) with a `StoreError`.
pub struct FailingStore {
    inner: SqliteCatalogStore,
    fail_on: usize,
    inserts: Arc<AtomicUsize>,
}

impl FailingStore {
    pub fn new(inner: SqliteCatalogStore, fail_on: usize) -> Self {
        FailingStore {
            inner,
            fail_on,
            inserts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl CatalogStore for FailingStore {
    async fn count_by_status(&self, account_id: AccountId, status: LinkStatus) -> AppResult<u64> {
        self.inner.count_by_status(account_id, status).await
    }

    async fn begin_batch(&self) -> AppResult<Box<dyn CatalogBatch>> {
        Ok(Box::new(FailingBatch {
            inner: self.inner.begin_batch().await?,
            fail_on: self.fail_on,
            inserts: self.inserts.clone(),
        }))
    }
}

struct FailingBatch {
    inner: Box<dyn CatalogBatch>,
    fail_on: usize,
    inserts: Arc<AtomicUsize>,
}

#[async_trait]
impl CatalogBatch for FailingBatch {
    async fn find_by_natural_key(&mut self, keys: &[NaturalKey]) -> AppResult<Vec<CatalogItem>> {
        self.inner.find_by_natural_key(keys).await
    }

    async fn insert_new(&mut self, records: &[RawRecord]) -> AppResult<Vec<ItemId>> {
        let call = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(AppError::StoreError(format!("disk full on insert #{}", call)));
        }
        self.inner.insert_new(records).await
    }

    async fn upsert_links(&mut self, account_id: AccountId, links: &[LinkUpsert]) -> AppResult<u64> {
        self.inner.upsert_links(account_id, links).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.inner.commit().await
    }
}
