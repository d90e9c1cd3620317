use crate::model::common::{AccountId, ExternalAccountId, ItemId, LinkStatus};
use crate::model::record::NaturalKey;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CatalogItem {
    pub id: ItemId,
    pub title: String,
    pub original_title: Option<String>,
    pub release_year: Option<i64>,
    pub genre: Option<String>,
    pub runtime_minutes: Option<i64>,
    pub director: Option<String>,
    pub source_rating: Option<f64>,
    pub external_rating: Option<f64>,
    pub image_url: Option<String>,
    pub source_link: Option<String>,
}

impl CatalogItem {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.title.clone(), self.release_year)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Account {
    pub id: AccountId,
    pub external_id: ExternalAccountId,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountItemLink {
    pub account_id: AccountId,
    pub item_id: ItemId,
    pub status: LinkStatus,
    pub personal_rating: Option<i64>,
    pub completed_date: Option<NaiveDate>,
    pub added_date: NaiveDate,
}

/// Desired state of one link row. Status is derived from the rating so the two
/// can never be written apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkUpsert {
    pub item_id: ItemId,
    personal_rating: Option<i64>,
}

impl LinkUpsert {
    pub fn new(item_id: ItemId, personal_rating: Option<i64>) -> Self {
        LinkUpsert {
            item_id,
            personal_rating,
        }
    }

    #[inline]
    pub fn status(&self) -> LinkStatus {
        LinkStatus::from_rating(self.personal_rating)
    }

    #[inline]
    pub fn personal_rating(&self) -> Option<i64> {
        self.personal_rating
    }
}
