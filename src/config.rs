use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use scraper::Selector;
use std::time::Duration;

use crate::model::common::{ExternalAccountId, ListKind};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://watchlist.db";
pub const DEFAULT_BASE_URL: &str = "https://ua.kinorium.com";
pub const PER_PAGE: u32 = 200;

pub const MAX_PAGE_CONCUR: usize = 4;
pub const MERGE_BATCH_SIZE: usize = 250;
pub const DB_MAX_CONNECTIONS: u32 = 5;

pub const HTTP_TIMEOUT_SECONDS: u64 = 35;
pub const HTTP_CONNECT_TIMEOUT: u64 = 20;

pub const SCROLL_STEP_PX: u32 = 100;
pub const SCROLL_DELAY_MS: u64 = 100;
pub const SCROLL_MAX_STEPS: u32 = 300;

pub const PROGRESS_IDLE_TIMEOUT_SECS: u64 = 120;

/// Tunables for one sync engine. Defaults mirror the constants above.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub base_url: String,
    pub max_page_concurrency: usize,
    pub merge_batch_size: usize,
    pub scroll_step_px: u32,
    pub scroll_delay: Duration,
    pub scroll_max_steps: u32,
    pub progress_idle_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_page_concurrency: MAX_PAGE_CONCUR,
            merge_batch_size: MERGE_BATCH_SIZE,
            scroll_step_px: SCROLL_STEP_PX,
            scroll_delay: Duration::from_millis(SCROLL_DELAY_MS),
            scroll_max_steps: SCROLL_MAX_STEPS,
            progress_idle_timeout: Duration::from_secs(PROGRESS_IDLE_TIMEOUT_SECS),
        }
    }
}

impl SyncSettings {
    pub fn page_url(&self, external_id: ExternalAccountId, kind: ListKind, page: u32) -> String {
        format!(
            "{}/user/{}/{}/?order=runtime&page={}&perpage={}&mode=movie&nav_type=movie",
            self.base_url.trim_end_matches('/'),
            external_id,
            kind.path_segment(),
            page,
            PER_PAGE
        )
    }
}

const CHROME_VER: &str = "124.0.0.0";
static USER_AGENT_VAL: Lazy<String> = Lazy::new(|| {
    format!(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
        CHROME_VER
    )
});

pub static BASE_PAGE_HEADERS: Lazy<HeaderMap> = Lazy::new(|| {
    let mut h = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(&USER_AGENT_VAL) {
        h.insert(USER_AGENT, ua);
    }
    h.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
    );
    h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("uk-UA,uk;q=0.9"));
    h
});

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("Invalid built-in selector '{}': {}", css, e))
}

pub static SEL_PAGES_SELECT: Lazy<Selector> = Lazy::new(|| selector("#pagesSelect"));
pub static SEL_PAGE_LINKS: Lazy<Selector> = Lazy::new(|| selector("#pagesSelect > ul > li > a"));
pub static SEL_ITEM_COUNT: Lazy<Selector> = Lazy::new(|| selector(".filmList__count"));

pub static SEL_PENDING_ITEM: Lazy<Selector> =
    Lazy::new(|| selector(".item.user-status-list.status_future"));
pub static SEL_COMPLETED_ITEM: Lazy<Selector> =
    Lazy::new(|| selector(".item.user-status-list.status_rated"));

pub static SEL_TITLE: Lazy<Selector> = Lazy::new(|| selector(".movie-title__text"));
pub static SEL_ORIGINAL_TITLE: Lazy<Selector> = Lazy::new(|| selector(".item__name-orig"));
pub static SEL_EXTRA_INFO: Lazy<Selector> = Lazy::new(|| selector(".filmList__extra-info"));
pub static SEL_DIRECTOR: Lazy<Selector> =
    Lazy::new(|| selector(".filmList__extra-info-director a"));
pub static SEL_SOURCE_RATING: Lazy<Selector> =
    Lazy::new(|| selector(".rating_kinorium .rating__value"));
pub static SEL_EXTERNAL_RATING: Lazy<Selector> = Lazy::new(|| selector(".rating_imdb .value"));
pub static SEL_IMAGE: Lazy<Selector> = Lazy::new(|| selector(".poster img"));
pub static SEL_DETAIL_LINK: Lazy<Selector> = Lazy::new(|| selector("a.filmList__item-title"));
pub static SEL_PERSONAL_RATING: Lazy<Selector> = Lazy::new(|| selector(".myRating"));

pub fn item_selector(kind: ListKind) -> &'static Selector {
    match kind {
        ListKind::Pending => &SEL_PENDING_ITEM,
        ListKind::Completed => &SEL_COMPLETED_ITEM,
    }
}

fn regex(pattern: &'static str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("Invalid built-in regex '{}': {}", pattern, e))
}

pub static RE_RUNTIME: Lazy<Regex> = Lazy::new(|| {
    regex(r"(\d+)\s*год(?:ин[аи]?)?(?:\s*(\d+)\s*хв)?|(\d+)\s*хв")
});
pub static RE_RATING: Lazy<Regex> = Lazy::new(|| regex(r"^\d+(?:\.\d)?$"));
pub static RE_RATING_CLASS: Lazy<Regex> = Lazy::new(|| regex(r"^number-(\d+)$"));
pub static RE_DIGITS: Lazy<Regex> = Lazy::new(|| regex(r"\d+"));
pub static RE_PROFILE_URL: Lazy<Regex> = Lazy::new(|| regex(r"/user/(\d+)/?"));
