use crate::logging::{log, LogLevel};
use crate::model::common::ExternalAccountId;
use serde::Serialize;
use std::time::Duration;

/// Final tally of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// Records merged after dropping untitled ones and collapsing duplicates.
    pub items_processed: u64,
    /// True when stored counts already matched the remote lists.
    pub skipped: bool,
    pub new_items: u64,
    pub links_written: u64,
    pub pages_ok: usize,
    pub failed_pages: usize,
    pub discarded_records: usize,
}

impl SyncResult {
    pub fn skipped() -> Self {
        SyncResult {
            skipped: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeTally {
    pub new_items: u64,
    pub links_written: u64,
}

impl MergeTally {
    pub fn add(&mut self, other: MergeTally) {
        self.new_items += other.new_items;
        self.links_written += other.links_written;
    }
}

pub fn print_summary(result: &SyncResult, external_id: ExternalAccountId, duration: Duration) {
    let sep = "=".repeat(60);
    let title = format!("Sync Summary (account {})", external_id);
    println!("\n{}\n{:^60}\n{}", sep, title, sep);
    println!("Total Run Time:    {:.3?}", duration);
    println!("{}", "-".repeat(60));

    if result.skipped {
        println!("Lists unchanged, nothing fetched.");
    } else {
        println!("{:<20} {:<8} {:<8}", "Pages", "OK", "Fail");
        println!("{:<20} {:<8} {:<8}", "", result.pages_ok, result.failed_pages);
        println!("{}", "-".repeat(60));
        println!("Items processed:    {}", result.items_processed);
        println!("New catalog items:  {}", result.new_items);
        println!("Links written:      {}", result.links_written);
        println!("Discarded records:  {}", result.discarded_records);
    }
    println!("{}", sep);

    log_overall_status(result);

    let end_ts_str = chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string();
    log(
        LogLevel::Step,
        &format!("--- Sync Finished at {} ---", end_ts_str),
    );
}

fn log_overall_status(result: &SyncResult) {
    if result.skipped {
        log(LogLevel::Success, "Sync skipped: stored lists already up to date.");
    } else if result.failed_pages > 0 {
        log(
            LogLevel::Error,
            &format!(
                "Sync completed with errors: {} page(s) failed and contributed nothing. Check logs.",
                result.failed_pages
            ),
        );
    } else {
        log(LogLevel::Success, "Sync completed successfully.");
    }
}

pub fn determine_exit_code(result: &SyncResult) -> i32 {
    if result.failed_pages > 0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_pages_make_the_run_exit_non_zero() {
        let clean = SyncResult {
            items_processed: 10,
            pages_ok: 2,
            ..Default::default()
        };
        assert_eq!(determine_exit_code(&clean), 0);
        assert_eq!(determine_exit_code(&SyncResult::skipped()), 0);

        let partial = SyncResult {
            failed_pages: 1,
            ..clean
        };
        assert_eq!(determine_exit_code(&partial), 1);
    }

    #[test]
    fn result_serializes_with_snake_case_fields() {
        let json = serde_json::to_value(SyncResult::skipped()).unwrap();
        assert_eq!(json["skipped"], true);
        assert_eq!(json["items_processed"], 0);
        assert_eq!(json["links_written"], 0);
    }
}
