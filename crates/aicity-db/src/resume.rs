//! Resume: rebuild a [`City`] from the store.
//!
//! Loading state at day D reproduces an engine behaviorally identical to
//! one that reached day D by simulating from day zero, modulo
//! reasoning-call content and RNG draws (the persisted seed covers
//! deterministic test runs).

use sqlx::{PgPool, Row};
use tracing::info;

use aicity_agents::bonds::BondTable;
use aicity_agents::gangs::GangSystem;
use aicity_agents::messages::MessageBus;
use aicity_agents::roster::Roster;
use aicity_core::config::CityConfig;
use aicity_core::city::City;
use aicity_events::EventLog;
use aicity_justice::CaseBook;
use aicity_ledger::TokenLedger;
use aicity_types::{Agent, Bond, Event, Gang, Message, PoliceCase, Project, Story, Transaction};
use aicity_world::{AssetRegistry, HomeLots, ProjectBoard};

use crate::DbError;

/// Load the saved simulation, or report that none exists.
///
/// # Errors
///
/// Returns [`DbError::NothingSaved`] on an empty store,
/// [`DbError::Corrupt`] when a payload fails to deserialize, and
/// [`DbError::Sqlx`] on query failure.
pub async fn load_city(pool: &PgPool, config: CityConfig) -> Result<City, DbError> {
    let day: u32 = match meta_u64(pool, "day").await? {
        Some(day) => day as u32,
        None => return Err(DbError::NothingSaved),
    };
    let seed = meta_u64(pool, "seed").await?.unwrap_or(config.world.seed);

    let agents: Vec<Agent> = load_payloads(pool, "SELECT data FROM agents ORDER BY id").await?;
    let transactions: Vec<Transaction> =
        load_payloads(pool, "SELECT data FROM transactions ORDER BY id").await?;
    let events: Vec<Event> = load_payloads(pool, "SELECT data FROM event_log ORDER BY id").await?;
    let cases: Vec<PoliceCase> =
        load_payloads(pool, "SELECT data FROM police_cases ORDER BY id").await?;
    let projects: Vec<Project> =
        load_payloads(pool, "SELECT data FROM shared_projects ORDER BY id").await?;
    let assets: Vec<aicity_types::Asset> =
        load_payloads(pool, "SELECT data FROM city_assets ORDER BY id").await?;
    let gangs: Vec<Gang> = load_payloads(pool, "SELECT data FROM gangs ORDER BY id").await?;
    let messages: Vec<Message> =
        load_payloads(pool, "SELECT data FROM messages ORDER BY id").await?;
    let bonds: Vec<Bond> =
        load_payloads(pool, "SELECT data FROM relationships ORDER BY a, b").await?;
    let stories: Vec<Story> =
        load_payloads(pool, "SELECT data FROM stories ORDER BY id").await?;
    let home_lots: Vec<aicity_world::tiles::HomeLot> =
        load_payloads(pool, "SELECT data FROM home_lots ORDER BY name").await?;

    let ledger = TokenLedger::from_transactions(config.ledger_config(), transactions)
        .map_err(|e| DbError::Ledger(e.to_string()))?;

    let newspaper = stories
        .iter()
        .filter(|s| s.kind == aicity_types::StoryKind::Daily)
        .max_by_key(|s| s.day)
        .map_or_else(
            || String::from("Welcome back to AIcity."),
            |s| s.body.clone(),
        );

    info!(day, agents = agents.len(), "city restored from store");
    Ok(City::from_parts(
        config.clone(),
        day,
        seed,
        Roster::from_agents(agents),
        ledger,
        EventLog::from_events(events),
        MessageBus::from_messages(config.visibility.message_ttl_days, messages),
        BondTable::from_bonds(bonds),
        GangSystem::from_gangs(gangs),
        ProjectBoard::from_projects(config.chance.project_abandon_days, projects),
        AssetRegistry::from_assets(assets),
        CaseBook::from_cases(cases),
        HomeLots::from_lots(home_lots),
        stories,
        newspaper,
    ))
}

async fn meta_u64(pool: &PgPool, key: &str) -> Result<Option<u64>, DbError> {
    let row = sqlx::query("SELECT value FROM meta WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.and_then(|r| {
        r.try_get::<serde_json::Value, _>("value")
            .ok()
            .and_then(|v| v.as_u64())
    }))
}

async fn load_payloads<T: serde::de::DeserializeOwned>(
    pool: &PgPool,
    sql: &str,
) -> Result<Vec<T>, DbError> {
    let rows = sqlx::query(sql).fetch_all(pool).await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let value: serde_json::Value = row.try_get("data")?;
        out.push(serde_json::from_value(value)?);
    }
    Ok(out)
}
