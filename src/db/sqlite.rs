use super::schema;
use crate::config;
use crate::core::data_store::{CatalogBatch, CatalogStore};
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::model::catalog::{Account, AccountItemLink, CatalogItem, LinkUpsert};
use crate::model::common::{AccountId, ExternalAccountId, ItemId, LinkStatus};
use crate::model::record::{NaturalKey, RawRecord};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

// SQLite binds at most 32766 parameters per statement; ten per item keeps
// the widest batch well inside that.
const MAX_ROWS_PER_STATEMENT: usize = 2_000;

const ITEM_COLUMNS: &str = "id, title, original_title, release_year, genre, runtime_minutes, \
     director, source_rating, external_rating, image_url, source_link";

/// The id scratch table is shared by every connection, so only one batch in
/// the process may be between its insert and its drain. Batches hold this for
/// their whole lifetime, which also keeps SQLite's single writer uncontended.
static SCRATCH_GATE: Lazy<Arc<Mutex<()>>> = Lazy::new(|| Arc::new(Mutex::new(())));

#[derive(Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(10));
        let pool = SqlitePoolOptions::new()
            .max_connections(config::DB_MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| AppError::StoreError(format!("Open {}: {}", database_url, e)))?;

        schema::apply(&pool).await?;
        Ok(SqliteCatalogStore { pool })
    }

    /// Creates the account or refreshes its username. A `None` username keeps
    /// whatever was stored before.
    pub async fn register_account(
        &self,
        external_id: ExternalAccountId,
        username: Option<&str>,
    ) -> AppResult<Account> {
        let account = sqlx::query_as::<_, Account>(
            "INSERT INTO accounts (external_id, username) VALUES (?, ?) \
             ON CONFLICT (external_id) DO UPDATE SET \
                 username = COALESCE(excluded.username, accounts.username) \
             RETURNING id, external_id, username",
        )
        .bind(external_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }

    pub async fn find_account(&self, external_id: ExternalAccountId) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, external_id, username FROM accounts WHERE external_id = ?",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    pub async fn links_for_account(&self, account_id: AccountId) -> AppResult<Vec<AccountItemLink>> {
        let rows = sqlx::query(
            "SELECT account_id, item_id, status, personal_rating, completed_date, added_date \
             FROM account_items WHERE account_id = ? ORDER BY item_id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> AppResult<AccountItemLink> {
                let status_text: String = row.try_get("status")?;
                let status = LinkStatus::parse(&status_text).ok_or_else(|| {
                    AppError::StoreError(format!("Unknown link status '{}'", status_text))
                })?;
                Ok(AccountItemLink {
                    account_id: row.try_get("account_id")?,
                    item_id: row.try_get("item_id")?,
                    status,
                    personal_rating: row.try_get("personal_rating")?,
                    completed_date: row.try_get("completed_date")?,
                    added_date: row.try_get("added_date")?,
                })
            })
            .collect()
    }

    pub async fn catalog_items(&self) -> AppResult<Vec<CatalogItem>> {
        let items = sqlx::query_as::<_, CatalogItem>(&format!(
            "SELECT {} FROM catalog_items ORDER BY id",
            ITEM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Case-insensitive substring match on title or original title, ordered by
    /// title. SQLite folds ASCII case only, so the query is tried as typed and
    /// in lower, upper and capitalized case.
    pub async fn search_titles(&self, query: &str) -> AppResult<Vec<CatalogItem>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM catalog_items WHERE ", ITEM_COLUMNS));
        for (idx, pattern) in like_patterns(query).into_iter().enumerate() {
            if idx > 0 {
                qb.push(" OR ");
            }
            qb.push("title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR original_title LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\'");
        }
        qb.push(" ORDER BY title, id");

        let items = qb
            .build_query_as::<CatalogItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Up to `count` random items from the account's pending links.
    pub async fn random_pending(&self, account_id: AccountId, count: u32) -> AppResult<Vec<CatalogItem>> {
        let items = sqlx::query_as::<_, CatalogItem>(&format!(
            "SELECT {} FROM catalog_items WHERE id IN ( \
                 SELECT item_id FROM account_items WHERE account_id = ? AND status = ? \
             ) ORDER BY RANDOM() LIMIT ?",
            ITEM_COLUMNS
        ))
        .bind(account_id)
        .bind(LinkStatus::Pending.as_str())
        .bind(i64::from(count))
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Rows left in the id scratch table. Zero whenever no batch is mid-insert.
    pub async fn scratch_len(&self) -> AppResult<u64> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", schema::SCRATCH_TABLE))
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn count_by_status(&self, account_id: AccountId, status: LinkStatus) -> AppResult<u64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM account_items WHERE account_id = ? AND status = ?",
        )
        .bind(account_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(n as u64)
    }

    async fn begin_batch(&self) -> AppResult<Box<dyn CatalogBatch>> {
        let gate = SCRATCH_GATE.clone().lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteBatch {
            tx,
            today: Local::now().date_naive(),
            _gate: gate,
        }))
    }
}

pub struct SqliteBatch {
    tx: Transaction<'static, Sqlite>,
    today: NaiveDate,
    _gate: OwnedMutexGuard<()>,
}

#[async_trait]
impl CatalogBatch for SqliteBatch {
    async fn find_by_natural_key(&mut self, keys: &[NaturalKey]) -> AppResult<Vec<CatalogItem>> {
        let mut found = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {} FROM catalog_items WHERE (title, IFNULL(release_year, '')) IN (",
                ITEM_COLUMNS
            ));
            qb.push_values(chunk, |mut b, key| {
                b.push_bind(key.title.clone());
                match key.release_year {
                    Some(year) => b.push_bind(year),
                    None => b.push_bind(""),
                };
            });
            qb.push(")");

            let rows = qb
                .build_query_as::<CatalogItem>()
                .fetch_all(&mut *self.tx)
                .await?;
            found.extend(rows);
        }
        Ok(found)
    }

    async fn insert_new(&mut self, records: &[RawRecord]) -> AppResult<Vec<ItemId>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let conn: &mut SqliteConnection = &mut self.tx;

        clear_scratch(conn).await?;
        let inserted = insert_and_drain(conn, records).await;
        let cleared = clear_scratch(conn).await;

        let ids = inserted?;
        cleared?;

        if ids.len() != records.len() {
            return Err(AppError::StoreError(format!(
                "Inserted {} catalog item(s) but recovered {} id(s)",
                records.len(),
                ids.len()
            )));
        }
        Ok(ids)
    }

    async fn upsert_links(&mut self, account_id: AccountId, links: &[LinkUpsert]) -> AppResult<u64> {
        let mut written = 0u64;
        for chunk in links.chunks(MAX_ROWS_PER_STATEMENT) {
            let today = self.today;
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO account_items \
                 (account_id, item_id, status, personal_rating, completed_date, added_date) ",
            );
            qb.push_values(chunk, |mut b, link| {
                let status = link.status();
                let completed_on = (status == LinkStatus::Completed).then_some(today);
                b.push_bind(account_id)
                    .push_bind(link.item_id)
                    .push_bind(status.as_str())
                    .push_bind(link.personal_rating())
                    .push_bind(completed_on)
                    .push_bind(today);
            });
            // Unchanged rows are filtered by the WHERE, so they neither count
            // nor lose their dates. A row that stays completed keeps its date.
            qb.push(
                " ON CONFLICT (account_id, item_id) DO UPDATE SET \
                     status = excluded.status, \
                     personal_rating = excluded.personal_rating, \
                     completed_date = CASE \
                         WHEN excluded.status = 'completed' AND account_items.status = 'completed' \
                             THEN account_items.completed_date \
                         ELSE excluded.completed_date \
                     END \
                 WHERE account_items.status IS NOT excluded.status \
                    OR account_items.personal_rating IS NOT excluded.personal_rating",
            );

            let result = qb.build().execute(&mut *self.tx).await?;
            written += result.rows_affected();
        }
        Ok(written)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let batch = *self;
        batch.tx.commit().await?;
        Ok(())
    }
}

fn like_patterns(query: &str) -> Vec<String> {
    let mut chars = query.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    };

    let mut variants: Vec<String> = Vec::with_capacity(4);
    for variant in [
        query.to_string(),
        query.to_lowercase(),
        query.to_uppercase(),
        capitalized,
    ] {
        if !variants.contains(&variant) {
            variants.push(variant);
        }
    }

    variants
        .iter()
        .map(|v| {
            let escaped = v
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
        .collect()
}

async fn clear_scratch(conn: &mut SqliteConnection) -> AppResult<()> {
    sqlx::query("DELETE FROM inserted_item_ids")
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_and_drain(
    conn: &mut SqliteConnection,
    records: &[RawRecord],
) -> AppResult<Vec<ItemId>> {
    for chunk in records.chunks(MAX_ROWS_PER_STATEMENT) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO catalog_items (title, original_title, release_year, genre, \
             runtime_minutes, director, source_rating, external_rating, image_url, source_link) ",
        );
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(r.title.clone())
                .push_bind(r.original_title.clone())
                .push_bind(r.release_year)
                .push_bind(r.genre.clone())
                .push_bind(r.runtime_minutes)
                .push_bind(r.director.clone())
                .push_bind(r.source_rating)
                .push_bind(r.external_rating)
                .push_bind(r.image_url.clone())
                .push_bind(r.source_link.clone());
        });
        qb.build().execute(&mut *conn).await?;
    }

    let ids: Vec<ItemId> = sqlx::query_scalar("SELECT item_id FROM inserted_item_ids ORDER BY seq")
        .fetch_all(&mut *conn)
        .await?;
    log(
        LogLevel::Step,
        &format!("Recovered {} new catalog id(s).", ids.len()),
    );
    Ok(ids)
}
