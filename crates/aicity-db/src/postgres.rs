//! Connection pool and idempotent schema bootstrap.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::DbError;

/// DDL for every table the checkpoint writes. `CREATE TABLE IF NOT
/// EXISTS` keeps the bootstrap idempotent across restarts.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS agents (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    role TEXT NOT NULL,
    status TEXT NOT NULL,
    balance BIGINT NOT NULL,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id UUID PRIMARY KEY,
    day INTEGER NOT NULL,
    kind TEXT NOT NULL,
    amount BIGINT NOT NULL,
    data JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS transactions_day_idx ON transactions (day);

CREATE TABLE IF NOT EXISTS vault (
    id INTEGER PRIMARY KEY DEFAULT 1,
    total_supply BIGINT NOT NULL,
    circulating BIGINT NOT NULL,
    vault_balance BIGINT NOT NULL,
    CHECK (circulating + vault_balance = total_supply)
);

CREATE TABLE IF NOT EXISTS event_log (
    id UUID PRIMARY KEY,
    day INTEGER NOT NULL,
    kind TEXT NOT NULL,
    visibility TEXT NOT NULL
        CHECK (visibility IN ('PRIVATE', 'WITNESSED', 'RUMOR', 'REPORTED', 'PUBLIC')),
    data JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS event_log_day_idx ON event_log (day);
CREATE INDEX IF NOT EXISTS event_log_visibility_idx ON event_log (visibility);

CREATE TABLE IF NOT EXISTS police_cases (
    id UUID PRIMARY KEY,
    day_opened INTEGER NOT NULL,
    status TEXT NOT NULL,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS shared_projects (
    id UUID PRIMARY KEY,
    status TEXT NOT NULL,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS city_assets (
    id UUID PRIMARY KEY,
    status TEXT NOT NULL,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS gangs (
    id UUID PRIMARY KEY,
    status TEXT NOT NULL,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id UUID PRIMARY KEY,
    day INTEGER NOT NULL,
    data JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS messages_day_idx ON messages (day);

CREATE TABLE IF NOT EXISTS relationships (
    a UUID NOT NULL,
    b UUID NOT NULL,
    data JSONB NOT NULL,
    PRIMARY KEY (a, b)
);

CREATE TABLE IF NOT EXISTS stories (
    id UUID PRIMARY KEY,
    kind TEXT NOT NULL,
    day INTEGER NOT NULL,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS graduations (
    id UUID PRIMARY KEY,
    day INTEGER NOT NULL,
    agent UUID NOT NULL,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS home_lots (
    name TEXT PRIMARY KEY,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS world_tiles (
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    PRIMARY KEY (x, y)
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value JSONB NOT NULL
);
";

/// Open a connection pool against the configured database.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] when the database is unreachable.
pub async fn connect(database_url: &str) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Create every table the adapter needs, if absent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on DDL failure.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), DbError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    info!("schema ensured");
    Ok(())
}
