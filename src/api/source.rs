use crate::error::AppResult;
use async_trait::async_trait;

/// Something that can open a rendered page of the listing service.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn open(&self, url: &str) -> AppResult<Box<dyn PageSession>>;
}

/// One open page. Must be closed by the caller once it is done reading.
#[async_trait]
pub trait PageSession: Send {
    /// Scrolls the viewport down by `step_px`; returns `true` once the
    /// viewport has reached the end of the document.
    async fn scroll_by(&mut self, step_px: u32) -> AppResult<bool>;

    async fn content(&mut self) -> AppResult<String>;

    async fn close(self: Box<Self>) -> AppResult<()>;
}
