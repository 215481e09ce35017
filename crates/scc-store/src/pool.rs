//! Connection pool setup and forward-only schema migration.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::error::StoreResult;

/// Open (creating if absent) the SQLite database at `path` and run any
/// pending migrations. `path` may be `:memory:` for tests.
pub async fn connect(path: &str) -> StoreResult<SqlitePool> {
    let url = if path == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite://{path}")
    };
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true).foreign_keys(true);

    // A single in-memory SQLite database only exists for the lifetime of one
    // connection; cap the pool to one connection so tests see one database.
    let max_connections = if path == ":memory:" { 1 } else { 8 };
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_runs_migrations_on_fresh_database() {
        let pool = connect(":memory:").await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs").fetch_one(&pool).await.unwrap();
        assert_eq!(row.0, 0);
    }
}
