//! The AIcity engine binary.
//!
//! Startup order: tracing, configuration, database pool and schema,
//! resume-or-big-bang, observer server, LLM reasoner, then the day loop
//! on a blocking thread. Ctrl-C cancels at the next suspension point; an
//! invariant violation halts before the failed day is persisted.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use aicity_core::{CancelFlag, City, CityConfig, TickError, run_day};
use aicity_db::{PgCheckpoint, connect, ensure_schema, load_city};
use aicity_observer::{AppState, LiveObserver, serve};
use aicity_runner::LlmReasoner;

fn main() -> std::process::ExitCode {
    let config_path =
        std::env::var("AICITY_CONFIG").unwrap_or_else(|_| String::from("aicity.yaml"));
    let config = match CityConfig::from_file(Path::new(&config_path)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load {config_path}: {err}");
            CityConfig::default()
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.clone())),
        )
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to start the runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config, runtime.handle().clone())) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "engine stopped");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(
    config: CityConfig,
    handle: tokio::runtime::Handle,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Storage first: durable-first writes need a live pool before day one.
    let pool = connect(&config.infrastructure.database_url).await?;
    ensure_schema(&pool).await?;

    // Resume if a save exists; otherwise the big bang.
    let mut city = match load_city(&pool, config.clone()).await {
        Ok(city) => {
            info!(day = city.day, "resumed saved city");
            city
        }
        Err(aicity_db::DbError::NothingSaved) => {
            info!("no saved state; founding a new city");
            City::big_bang(config.clone())
        }
        Err(err) => return Err(err.into()),
    };

    // Observer server in the background; slow clients never touch the tick.
    let observer_state = Arc::new(AppState::new());
    let bind = config.infrastructure.observer_bind.clone();
    {
        let observer_state = Arc::clone(&observer_state);
        tokio::spawn(async move {
            if let Err(err) = serve(observer_state, &bind).await {
                error!(%err, "observer server exited");
            }
        });
    }

    let mut reasoner = LlmReasoner::new(&config.llm, handle.clone())?;
    let mut checkpoint = PgCheckpoint::new(pool, handle.clone());
    let mut observer = LiveObserver::new(Arc::clone(&observer_state), handle.clone());

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("ctrl-c received; cancelling at the next suspension point");
                cancel.cancel();
            }
        });
    }

    let run_days = config.world.run_days;
    // The day loop is synchronous by design; keep it off the async
    // worker threads.
    let result = tokio::task::spawn_blocking(move || {
        for _ in 0..run_days {
            match run_day(
                &mut city,
                &mut reasoner,
                &mut checkpoint,
                &mut observer,
                &cancel,
            ) {
                Ok(summary) => {
                    info!(
                        day = summary.day,
                        alive = summary.agents_alive,
                        deaths = summary.deaths,
                        "day complete"
                    );
                }
                Err(TickError::Cancelled) => {
                    warn!("simulation cancelled; storage holds the last completed day");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
        info!("simulation complete");
        Ok(())
    })
    .await?;

    result.map_err(Into::into)
}
