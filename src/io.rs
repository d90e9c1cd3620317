use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::utils;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

fn map_io_error(error: std::io::Error, path: &Path) -> AppError {
    AppError::Io(format!("I/O error at path '{}': {}", path.display(), error))
}

pub async fn read_text(fpath: &Path) -> AppResult<String> {
    fs::read_to_string(fpath)
        .await
        .map_err(|e| map_io_error(e, fpath))
}

async fn write_file_async(fpath: &Path, data: &[u8]) -> AppResult<()> {
    if let Some(parent) = fpath.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| map_io_error(e, parent))?;
    }
    let mut file = File::create(fpath)
        .await
        .map_err(|e| map_io_error(e, fpath))?;
    file.write_all(data)
        .await
        .map_err(|e| map_io_error(e, fpath))?;
    file.flush().await.map_err(|e| map_io_error(e, fpath))?;

    Ok(())
}

pub fn to_json_pretty<T: Serialize + ?Sized>(data: &T) -> AppResult<String> {
    serde_json::to_string_pretty(data).map_err(AppError::from)
}

/// Serializes off the async workers and writes the result. A partially written
/// file is removed again.
pub async fn save_json<T>(fpath: PathBuf, data: T, log_ctx: String) -> AppResult<()>
where
    T: Serialize + Send + Sync + 'static,
{
    let json_string = match utils::run_cpu_intensive(move || to_json_pretty(&data)).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) | Err(e) => {
            log(
                LogLevel::Error,
                &format!(
                    "Save JSON ({}) FAIL - Serialize/Task Error: {}. File: '{}'",
                    log_ctx,
                    e,
                    fpath.display()
                ),
            );
            return Err(e);
        }
    };

    if let Err(e) = write_file_async(&fpath, json_string.as_bytes()).await {
        log(
            LogLevel::Error,
            &format!(
                "Save JSON ({}) FAIL - Write Error: {}. File: '{}'",
                log_ctx,
                e,
                fpath.display()
            ),
        );
        if fs::try_exists(&fpath).await.unwrap_or(false) {
            let _ = fs::remove_file(&fpath).await;
        }
        return Err(e);
    }

    log(
        LogLevel::Success,
        &format!("Saved {} to {}", log_ctx, fpath.display()),
    );
    Ok(())
}
