use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema: analysis results with flattened pricing
/// snapshot columns, certification reference data, billing settings, and
/// indexes. `pricing_saved_at IS NULL` means "no snapshot".
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS analysis_results (
                    id TEXT PRIMARY KEY,
                    batch_id TEXT NOT NULL,
                    file_id TEXT NOT NULL,
                    file_name TEXT NOT NULL,
                    word_count INTEGER NOT NULL CHECK (word_count >= 0),
                    page_count INTEGER NOT NULL CHECK (page_count >= 0),
                    document_type TEXT,
                    complexity TEXT NOT NULL,
                    document_count INTEGER NOT NULL CHECK (document_count >= 0),
                    sub_documents TEXT NOT NULL,
                    processing_status TEXT NOT NULL,
                    entry_method TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    pricing_billable_page_tenths INTEGER,
                    pricing_complexity TEXT,
                    pricing_complexity_multiplier INTEGER,
                    pricing_base_rate_cents INTEGER,
                    pricing_certification_type_id TEXT,
                    pricing_is_excluded INTEGER,
                    pricing_is_billable_overridden INTEGER,
                    pricing_document_certifications TEXT,
                    pricing_saved_at TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS certification_types (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    code TEXT NOT NULL UNIQUE,
                    unit_price_cents INTEGER NOT NULL CHECK (unit_price_cents >= 0),
                    active INTEGER NOT NULL DEFAULT 1,
                    sort_order INTEGER NOT NULL DEFAULT 0
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS app_settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_analysis_results_batch_created
                    ON analysis_results (batch_id, created_at, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_certification_types_active_sort
                    ON certification_types (active, sort_order, name);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
