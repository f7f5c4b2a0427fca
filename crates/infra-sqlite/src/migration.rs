// Migration Runner

use blob_watcher_core::error::{AppError, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Ordered list of (version, description, sql)
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "Jobs table",
    include_str!("../migrations/001_initial_schema.sql"),
)];

fn db_error(err: sqlx::Error) -> AppError {
    AppError::Database(err.to_string())
}

/// Bring the schema up to the latest version
///
/// Each pending migration runs in its own transaction together with its
/// `schema_version` row, so a failed migration leaves no partial schema.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(db_error)?;

    let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(db_error)?;

    let pending: Vec<_> = MIGRATIONS.iter().filter(|(v, _, _)| *v > current).collect();
    if pending.is_empty() {
        debug!(version = current, "Schema up to date");
        return Ok(());
    }

    for (version, description, sql) in pending {
        info!(version, description, "Applying migration");
        apply_migration(pool, *version, description, sql).await?;
    }
    Ok(())
}

async fn apply_migration(
    pool: &SqlitePool,
    version: i64,
    description: &str,
    sql: &str,
) -> Result<()> {
    let mut tx = pool.begin().await.map_err(db_error)?;

    // sqlx runs one statement per query; comment lines are dropped first
    let statements = sql.split(';').map(|chunk| {
        chunk
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n")
    });
    for statement in statements {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Migration {:03} failed: {}", version, e)))?;
    }

    sqlx::query(
        "INSERT INTO schema_version (version, description, applied_at)
         VALUES (?, ?, CAST(strftime('%s', 'now') AS INTEGER) * 1000)",
    )
    .bind(version)
    .bind(description)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    tx.commit().await.map_err(db_error)
}
