use serde::{Deserialize, Serialize};
use std::fmt;

pub type AccountId = i64;
pub type ItemId = i64;
pub type ExternalAccountId = i64;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    /// Items the account plans to watch.
    Pending,
    /// Items the account has rated.
    Completed,
}

impl ListKind {
    #[inline]
    pub fn path_segment(self) -> &'static str {
        match self {
            ListKind::Pending => "watchlist",
            ListKind::Completed => "votes",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Pending => f.write_str("pending"),
            ListKind::Completed => f.write_str("completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Pending,
    Completed,
}

impl LinkStatus {
    /// A present rating, zero included, marks the item as completed.
    #[inline]
    pub fn from_rating(personal_rating: Option<i64>) -> LinkStatus {
        if personal_rating.is_some() {
            LinkStatus::Completed
        } else {
            LinkStatus::Pending
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            LinkStatus::Pending => "pending",
            LinkStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<LinkStatus> {
        match value {
            "pending" => Some(LinkStatus::Pending),
            "completed" => Some(LinkStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
