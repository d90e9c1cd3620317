use crate::error::AppResult;
use crate::model::catalog::{CatalogItem, LinkUpsert};
use crate::model::common::{AccountId, ItemId, LinkStatus};
use crate::model::record::{NaturalKey, RawRecord};
use async_trait::async_trait;

/// Persisted catalog the sync engine merges into.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn count_by_status(&self, account_id: AccountId, status: LinkStatus) -> AppResult<u64>;

    /// Opens one merge batch. Everything done through the batch becomes
    /// visible on `commit`; dropping it uncommitted discards the lot.
    async fn begin_batch(&self) -> AppResult<Box<dyn CatalogBatch>>;
}

#[async_trait]
pub trait CatalogBatch: Send {
    async fn find_by_natural_key(&mut self, keys: &[NaturalKey]) -> AppResult<Vec<CatalogItem>>;

    /// Inserts new catalog rows and returns their ids, one per record, in the
    /// order the records were given.
    async fn insert_new(&mut self, records: &[RawRecord]) -> AppResult<Vec<ItemId>>;

    /// Conflict-aware write keyed by `(account_id, item_id)`. Returns the
    /// number of rows actually inserted or changed.
    async fn upsert_links(&mut self, account_id: AccountId, links: &[LinkUpsert]) -> AppResult<u64>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
