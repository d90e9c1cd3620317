use crate::error::{AppError, AppResult};
use crate::io;
use crate::logging::{log, LogLevel};
use crate::model::common::ListKind;
use crate::model::record::RawRecord;
use crate::transform::page;
use crate::utils;
use std::path::{Path, PathBuf};

/// Offline mode: parse a saved list page and emit its records as JSON, either
/// to `output_path` or to stdout. Returns the number of records found.
pub async fn parse_saved_page(
    input_path: &Path,
    kind: ListKind,
    output_path: Option<PathBuf>,
) -> AppResult<usize> {
    log(LogLevel::Info, "--- Running Offline Page Parse ---");
    log(
        LogLevel::Info,
        &format!("Input file: {} ({} list)", input_path.display(), kind),
    );

    if !input_path.exists() {
        return Err(AppError::Argument(format!(
            "Input file not found: {}",
            input_path.display()
        )));
    }
    let html = io::read_text(input_path).await?;

    let (totals, records) = utils::run_cpu_intensive(move || {
        let totals = page::extract_totals(&html, kind);
        let records = page::parse_page_records(&html, kind);
        (totals, records)
    })
    .await?;

    match totals {
        Ok(t) => log(
            LogLevel::Info,
            &format!("Page reports {} page(s), {} item(s) in total.", t.pages, t.items),
        ),
        Err(e) => log(LogLevel::Warning, &format!("No list totals on page: {}", e)),
    }

    let untitled = records.iter().filter(|r| r.title.is_none()).count();
    if untitled > 0 {
        log(
            LogLevel::Warning,
            &format!("{} record(s) have no title and would be discarded on sync.", untitled),
        );
    }
    log(
        LogLevel::Success,
        &format!("Parsed {} record(s).", records.len()),
    );

    let count = records.len();
    emit_records(records, output_path).await?;
    Ok(count)
}

async fn emit_records(records: Vec<RawRecord>, output_path: Option<PathBuf>) -> AppResult<()> {
    match output_path {
        Some(path) => io::save_json(path, records, "parsed records".to_string()).await,
        None => {
            println!("{}", io::to_json_pretty(&records)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAVED_PAGE: &str = r#"
        <html><body>
          <div class="filmList__count">1</div>
          <div id="pagesSelect"><ul><li><a>1</a></li></ul></div>
          <div class="item user-status-list status_rated">
            <a class="filmList__item-title" href="/123/"><span class="movie-title__text">Сталкер</span></a>
            <span class="item__name-orig">Stalker, 1979</span>
            <span class="filmList__extra-info">драма, фантастика, 2 години 41 хв</span>
            <span class="myRating number-9"></span>
          </div>
        </body></html>
    "#;

    #[tokio::test]
    async fn saved_page_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("votes.html");
        std::fs::write(&input, SAVED_PAGE).unwrap();
        let output = dir.path().join("out.json");

        let count = parse_saved_page(&input, ListKind::Completed, Some(output.clone()))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json[0]["title"], "Сталкер");
        assert_eq!(json[0]["release_year"], 1979);
        assert_eq!(json[0]["runtime_minutes"], 161);
        assert_eq!(json[0]["personal_rating"], 9);
    }

    #[tokio::test]
    async fn missing_input_is_an_argument_error() {
        let err = parse_saved_page(Path::new("/no/such/page.html"), ListKind::Pending, None)
            .await
            .unwrap_err();
        assert!(err.is_argument());
    }
}
