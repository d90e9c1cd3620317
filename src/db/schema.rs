use crate::error::AppResult;
use crate::logging::{log, LogLevel};
use sqlx::SqlitePool;

pub const SCRATCH_TABLE: &str = "inserted_item_ids";

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id INTEGER NOT NULL UNIQUE,
        username TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS catalog_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        original_title TEXT,
        release_year INTEGER,
        genre TEXT,
        runtime_minutes INTEGER,
        director TEXT,
        source_rating REAL,
        external_rating REAL,
        image_url TEXT,
        source_link TEXT
    )
    "#,
    "DROP INDEX IF EXISTS ix_catalog_items_natural_key",
    // NULL years would be distinct under a plain unique index. An unknown year
    // maps to text, which never compares equal to an integer year.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS ix_catalog_items_title_year
        ON catalog_items (title, IFNULL(release_year, ''))
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS account_items (
        account_id INTEGER NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
        item_id INTEGER NOT NULL REFERENCES catalog_items (id) ON DELETE CASCADE,
        status TEXT NOT NULL CHECK (status IN ('pending', 'completed')),
        personal_rating INTEGER,
        completed_date TEXT,
        added_date TEXT NOT NULL,
        PRIMARY KEY (account_id, item_id),
        CHECK ((status = 'completed') = (personal_rating IS NOT NULL))
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS ix_account_items_status
        ON account_items (account_id, status)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inserted_item_ids (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_catalog_items_capture_id
    AFTER INSERT ON catalog_items
    BEGIN
        INSERT INTO inserted_item_ids (item_id) VALUES (NEW.id);
    END
    "#,
];

pub async fn apply(pool: &SqlitePool) -> AppResult<()> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    log(LogLevel::Info, "Catalog schema ready.");
    Ok(())
}
