use crate::api::source::{PageSession, RemoteSource};
use crate::config;
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Plain HTTP access to the listing service. A session holds the document as
/// served and reports the end of the page on the first scroll. Nothing is
/// rendered, so content filled in lazily by scripts (for example the `src` of
/// lazy-loaded posters) is not available through this source.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config::HTTP_TIMEOUT_SECONDS))
            .connect_timeout(Duration::from_secs(config::HTTP_CONNECT_TIMEOUT))
            .default_headers(config::BASE_PAGE_HEADERS.clone())
            .gzip(true)
            .build()
            .map_err(|e| AppError::ConfigError(format!("HTTP client build failed: {}", e)))?;
        Ok(HttpSource { client })
    }

    async fn load(&self, url: &str) -> AppResult<String> {
        let log_prefix = format!("Page GET {}", short_url(url));

        let resp = self.client.get(url).send().await.map_err(|e| {
            let context_str = if e.is_timeout() {
                "Timeout"
            } else if e.is_connect() {
                "Connection"
            } else {
                "Request"
            };
            log(
                LogLevel::Warning,
                &format!("{} {} Error: {}", log_prefix, context_str, e),
            );
            AppError::RemoteUnavailable(format!("{} {} Error: {}", log_prefix, context_str, e))
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(handle_http_error(resp, status, &log_prefix).await);
        }

        resp.text().await.map_err(|e| {
            log(
                LogLevel::Warning,
                &format!("{} - Error reading response body: {}", log_prefix, e),
            );
            AppError::from(e)
        })
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn open(&self, url: &str) -> AppResult<Box<dyn PageSession>> {
        let document = self.load(url).await?;
        Ok(Box::new(StaticPageSession { document }))
    }
}

struct StaticPageSession {
    document: String,
}

#[async_trait]
impl PageSession for StaticPageSession {
    async fn scroll_by(&mut self, _step_px: u32) -> AppResult<bool> {
        Ok(true)
    }

    async fn content(&mut self) -> AppResult<String> {
        Ok(self.document.clone())
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

async fn handle_http_error(resp: Response, status: StatusCode, log_prefix: &str) -> AppError {
    let resp_text = resp
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    let message = format!(
        "{} HTTP {} ({}). Body: {}...",
        log_prefix,
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Status"),
        resp_text.chars().take(150).collect::<String>()
    );
    log(LogLevel::Warning, &message);
    AppError::RemoteUnavailable(message)
}

fn short_url(url: &str) -> &str {
    url.split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_session_is_at_the_end_from_the_start() {
        let mut session: Box<dyn PageSession> = Box::new(StaticPageSession {
            document: "<html><body>served</body></html>".to_string(),
        });
        assert!(session.scroll_by(100).await.unwrap());
        assert_eq!(
            session.content().await.unwrap(),
            "<html><body>served</body></html>"
        );
        session.close().await.unwrap();
    }

    #[test]
    fn log_urls_drop_the_scheme() {
        assert_eq!(
            short_url("https://ua.kinorium.com/user/1/votes/?page=2"),
            "ua.kinorium.com/user/1/votes/?page=2"
        );
        assert_eq!(short_url("no-scheme"), "no-scheme");
    }
}
