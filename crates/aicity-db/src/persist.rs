//! The end-of-day checkpoint: one SQL transaction per day.
//!
//! [`PgCheckpoint`] adapts the async store to the scheduler's synchronous
//! [`CheckpointSink`] contract by blocking on the runtime handle. The
//! whole delta commits or none of it does; transient SQL failures map to
//! retryable checkpoint errors.

use sqlx::{PgPool, Postgres, Transaction as SqlxTx};
use tracing::debug;
use uuid::Uuid;

use aicity_core::scheduler::{CheckpointError, CheckpointSink, DayDelta};

use crate::DbError;

/// Synchronous checkpoint sink over a `PostgreSQL` pool.
pub struct PgCheckpoint {
    pool: PgPool,
    runtime: tokio::runtime::Handle,
}

impl PgCheckpoint {
    pub fn new(pool: PgPool, runtime: tokio::runtime::Handle) -> Self {
        Self { pool, runtime }
    }
}

impl CheckpointSink for PgCheckpoint {
    fn persist_day(&mut self, delta: &DayDelta) -> Result<(), CheckpointError> {
        let pool = self.pool.clone();
        let delta = delta.clone();
        self.runtime
            .block_on(async move { persist_day(&pool, &delta).await })
            .map_err(|err| match err {
                DbError::Sqlx(e) if is_transient(&e) => {
                    CheckpointError::Transient(e.to_string())
                }
                other => CheckpointError::Fatal(other.to_string()),
            })
    }
}

/// Whether a sqlx error is worth retrying.
fn is_transient(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}

/// Flush the whole day delta in one transaction.
///
/// # Errors
///
/// Returns [`DbError`] if any statement or the commit fails; nothing is
/// partially visible.
pub async fn persist_day(pool: &PgPool, delta: &DayDelta) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for agent in &delta.agents {
        upsert(
            &mut tx,
            "INSERT INTO agents (id, name, role, status, balance, data)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE SET
                 name = EXCLUDED.name, role = EXCLUDED.role, status = EXCLUDED.status,
                 balance = EXCLUDED.balance, data = EXCLUDED.data",
            agent.id.into_inner(),
            &[
                Column::Text(agent.name.clone()),
                Column::Text(agent.role.as_str().to_owned()),
                Column::Text(format!("{:?}", agent.status).to_lowercase()),
                Column::BigInt(agent.balance as i64),
                Column::Json(serde_json::to_value(agent)?),
            ],
        )
        .await?;
    }

    for t in &delta.transactions {
        // Transactions are append-only; conflicts mean a replayed delta.
        upsert(
            &mut tx,
            "INSERT INTO transactions (id, day, kind, amount, data)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO NOTHING",
            t.id.into_inner(),
            &[
                Column::Int(t.day as i32),
                Column::Text(format!("{:?}", t.kind).to_lowercase()),
                Column::BigInt(t.amount as i64),
                Column::Json(serde_json::to_value(t)?),
            ],
        )
        .await?;
    }

    sqlx::query(
        "INSERT INTO vault (id, total_supply, circulating, vault_balance)
         VALUES (1, $1, $2, $3)
         ON CONFLICT (id) DO UPDATE SET
             total_supply = EXCLUDED.total_supply,
             circulating = EXCLUDED.circulating,
             vault_balance = EXCLUDED.vault_balance",
    )
    .bind(delta.vault.total_supply as i64)
    .bind(delta.vault.circulating as i64)
    .bind(delta.vault.vault_balance as i64)
    .execute(&mut *tx)
    .await?;

    for event in &delta.events {
        upsert(
            &mut tx,
            "INSERT INTO event_log (id, day, kind, visibility, data)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                 visibility = EXCLUDED.visibility, data = EXCLUDED.data",
            event.id.into_inner(),
            &[
                Column::Int(event.day as i32),
                Column::Text(format!("{:?}", event.kind).to_lowercase()),
                Column::Text(event.visibility.as_str().to_owned()),
                Column::Json(serde_json::to_value(event)?),
            ],
        )
        .await?;
    }

    for case in &delta.cases {
        upsert(
            &mut tx,
            "INSERT INTO police_cases (id, day_opened, status, data)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET
                 status = EXCLUDED.status, data = EXCLUDED.data",
            case.id.into_inner(),
            &[
                Column::Int(case.day_opened as i32),
                Column::Text(format!("{:?}", case.status).to_lowercase()),
                Column::Json(serde_json::to_value(case)?),
            ],
        )
        .await?;
    }

    for project in &delta.projects {
        upsert(
            &mut tx,
            "INSERT INTO shared_projects (id, status, data)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET
                 status = EXCLUDED.status, data = EXCLUDED.data",
            project.id.into_inner(),
            &[
                Column::Text(format!("{:?}", project.status).to_lowercase()),
                Column::Json(serde_json::to_value(project)?),
            ],
        )
        .await?;
    }

    for asset in &delta.assets {
        upsert(
            &mut tx,
            "INSERT INTO city_assets (id, status, data)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET
                 status = EXCLUDED.status, data = EXCLUDED.data",
            asset.id.into_inner(),
            &[
                Column::Text(format!("{:?}", asset.status).to_lowercase()),
                Column::Json(serde_json::to_value(asset)?),
            ],
        )
        .await?;
    }

    for gang in &delta.gangs {
        upsert(
            &mut tx,
            "INSERT INTO gangs (id, status, data)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET
                 status = EXCLUDED.status, data = EXCLUDED.data",
            gang.id.into_inner(),
            &[
                Column::Text(format!("{:?}", gang.status).to_lowercase()),
                Column::Json(serde_json::to_value(gang)?),
            ],
        )
        .await?;
    }

    for message in &delta.messages {
        upsert(
            &mut tx,
            "INSERT INTO messages (id, day, data)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO NOTHING",
            message.id.into_inner(),
            &[
                Column::Int(message.day as i32),
                Column::Json(serde_json::to_value(message)?),
            ],
        )
        .await?;
    }

    for bond in &delta.bonds {
        sqlx::query(
            "INSERT INTO relationships (a, b, data)
             VALUES ($1, $2, $3)
             ON CONFLICT (a, b) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(bond.a.into_inner())
        .bind(bond.b.into_inner())
        .bind(serde_json::to_value(bond)?)
        .execute(&mut *tx)
        .await?;
    }

    // Graduations get their own table for the city's records office.
    for event in delta
        .events
        .iter()
        .filter(|e| matches!(e.kind, aicity_types::EventKind::Graduation))
    {
        sqlx::query(
            "INSERT INTO graduations (id, day, agent, data)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(event.id.into_inner())
        .bind(event.day as i32)
        .bind(event.actor.into_inner())
        .bind(serde_json::to_value(event)?)
        .execute(&mut *tx)
        .await?;
    }

    for lot in &delta.home_lots {
        sqlx::query(
            "INSERT INTO home_lots (name, data)
             VALUES ($1, $2)
             ON CONFLICT (name) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(lot.name.clone())
        .bind(serde_json::to_value(lot)?)
        .execute(&mut *tx)
        .await?;
    }

    for asset in delta.assets.iter().filter(|a| a.tile.is_some()) {
        if let Some(tile) = asset.tile {
            sqlx::query(
                "INSERT INTO world_tiles (x, y, kind, status)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (x, y) DO UPDATE SET
                     kind = EXCLUDED.kind, status = EXCLUDED.status",
            )
            .bind(tile.x)
            .bind(tile.y)
            .bind(format!("{:?}", asset.kind).to_lowercase())
            .bind(format!("{:?}", asset.status).to_lowercase())
            .execute(&mut *tx)
            .await?;
        }
    }

    for story in &delta.stories {
        upsert(
            &mut tx,
            "INSERT INTO stories (id, kind, day, data)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO NOTHING",
            story.id.into_inner(),
            &[
                Column::Text(format!("{:?}", story.kind).to_lowercase()),
                Column::Int(story.day as i32),
                Column::Json(serde_json::to_value(story)?),
            ],
        )
        .await?;
    }

    // The day counter commits last inside the same transaction: a resume
    // sees the new day only if everything above landed.
    sqlx::query(
        "INSERT INTO meta (key, value) VALUES ('day', $1)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
    )
    .bind(serde_json::json!(delta.day))
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "INSERT INTO meta (key, value) VALUES ('seed', $1)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
    )
    .bind(serde_json::json!(delta.seed))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    debug!(day = delta.day, events = delta.events.len(), "day checkpoint committed");
    Ok(())
}

/// A bound column value for the generic upsert helper.
enum Column {
    Text(String),
    Int(i32),
    BigInt(i64),
    Json(serde_json::Value),
}

/// Run an id-keyed upsert with heterogeneous bind values.
async fn upsert(
    tx: &mut SqlxTx<'_, Postgres>,
    sql: &str,
    id: Uuid,
    columns: &[Column],
) -> Result<(), DbError> {
    let mut query = sqlx::query(sql).bind(id);
    for column in columns {
        query = match column {
            Column::Text(v) => query.bind(v.clone()),
            Column::Int(v) => query.bind(*v),
            Column::BigInt(v) => query.bind(*v),
            Column::Json(v) => query.bind(v.clone()),
        };
    }
    query.execute(&mut **tx).await?;
    Ok(())
}
