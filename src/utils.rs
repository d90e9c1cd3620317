use crate::config;
use crate::error::{AppError, AppResult};
use crate::model::common::ExternalAccountId;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task;

pub async fn run_cpu_intensive<F, T>(func: F) -> AppResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(func).await.map_err(AppError::from)
}

pub async fn acquire_permit(
    semaphore: &Arc<Semaphore>,
    context: &str,
) -> AppResult<OwnedSemaphorePermit> {
    semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| AppError::SemaphoreAcquire(format!("Failed for '{}': {}", context, e)))
}

/// Accepts either a bare numeric id or a profile link such as
/// `https://ua.kinorium.com/user/112144/`.
pub fn parse_external_account_id(input: &str) -> AppResult<ExternalAccountId> {
    let trimmed = input.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed
            .parse::<ExternalAccountId>()
            .map_err(|e| AppError::Argument(format!("Account id '{}' out of range: {}", trimmed, e)));
    }

    config::RE_PROFILE_URL
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<ExternalAccountId>().ok())
        .ok_or_else(|| {
            AppError::Argument(format!(
                "'{}' is neither an account id nor a profile link (e.g. 112144 or {}/user/112144/)",
                trimmed,
                config::DEFAULT_BASE_URL
            ))
        })
}
