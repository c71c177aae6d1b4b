pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
mod maintenance;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod store;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use sqlx::PgPool;

use crate::core::config::{Settings, StoreBackend};
use crate::core::{clock, redis::RedisHandle, state::AppState, telemetry};
use crate::store::Stores;

pub use crate::maintenance::MaintenanceTask;

async fn connect_redis(settings: &Settings) -> RedisHandle {
    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; login rate limiting disabled");
    } else {
        tracing::info!("Redis connected successfully");
    }
    redis
}

async fn connect_postgres(settings: &Settings) -> anyhow::Result<PgPool> {
    let db_pool = db::init_pool(settings).await.context("Failed to connect to Postgres")?;
    db::run_migrations(&db_pool).await.context("Failed to apply migrations")?;
    Ok(db_pool)
}

async fn build_state(settings: Settings) -> anyhow::Result<AppState> {
    let stores = match settings.exam().store_backend {
        StoreBackend::Postgres => Stores::postgres(connect_postgres(&settings).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; all data is lost on restart");
            Stores::memory()
        }
    };

    let redis = connect_redis(&settings).await;
    Ok(AppState::new(settings, redis, stores, clock::system()))
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let state = build_state(settings).await?;

    if let Err(err) = core::bootstrap::ensure_superuser(&state).await {
        tracing::error!(error = %err, "Failed to ensure default superuser");
    }

    // In-memory sessions are only visible to this process.
    let (sweep_shutdown, sweep_rx) = tokio::sync::watch::channel(false);
    let sweep = (state.settings().exam().store_backend == StoreBackend::Memory)
        .then(|| tokio::spawn(tasks::scheduler::close_expired_loop(state.clone(), sweep_rx)));

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        store_backend = state.settings().exam().store_backend.as_str(),
        "CBT portal API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    if let Some(sweep) = sweep {
        let _ = sweep_shutdown.send(true);
        if let Err(err) = sweep.await {
            tracing::error!(error = %err, "Expiry sweep join failed");
        }
    }

    state.redis().disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

pub async fn run_worker() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    if settings.exam().store_backend == StoreBackend::Memory {
        anyhow::bail!("cbt-worker needs CBT_STORE_BACKEND=postgres; the API sweeps in-memory sessions itself");
    }

    let state = build_state(settings).await?;
    let result = tasks::scheduler::run(state.clone()).await;

    state.redis().disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

pub async fn run_maintenance(task: MaintenanceTask) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let pool = connect_postgres(&settings).await?;
    maintenance::run_task(&pool, task).await
}
