mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use leadfunnel_core::{AppConfig, Clock, SystemClock};
use leadfunnel_db::{LeadStore, MemoryLeadStore, PgLeadStore};
use leadfunnel_enrich::{LookupAggregator, PlacesClient};
use leadfunnel_notify::StaffNotifier;
use leadfunnel_queue::{FileState, RetryPolicy, SubmissionQueue};
use leadfunnel_tracking::TrackingDispatcher;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState, TwilioWebhookAuth},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(leadfunnel_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting lead funnel server");

    let state = build_state(&config).await?;
    let _scheduler = scheduler::build_scheduler(state.queue.clone(), &config.flush_cron).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        leadfunnel_core::Environment::Development
    ))?;
    let app = build_app(state, auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (leads, pool) = open_store(config, &clock).await?;

    let pending = FileState::open(&config.pending_dir).await?;
    tracing::info!(dir = %pending.dir().display(), "pending submissions directory ready");
    let queue = SubmissionQueue::new(
        Arc::clone(&leads),
        Arc::new(pending),
        RetryPolicy::from_app_config(config),
        Arc::clone(&clock),
    );

    let places = PlacesClient::from_config(config)?.map(Arc::new);
    let aggregator = LookupAggregator::from_config(config, Arc::clone(&clock))?;
    let tracking = TrackingDispatcher::from_config(config, Arc::clone(&clock))?;
    tracing::info!(sinks = ?tracking.sink_names(), "tracking sinks configured");
    let notifier = StaffNotifier::from_config(config)?;
    let twilio_webhooks = TwilioWebhookAuth::from_config(config).map(Arc::new);

    Ok(AppState {
        leads,
        queue,
        places,
        aggregator: Arc::new(aggregator),
        tracking: Arc::new(tracking),
        notifier: Arc::new(notifier),
        clock,
        pool,
        twilio_webhooks,
    })
}

/// Postgres when `DATABASE_URL` is set, otherwise a process-local store.
async fn open_store(
    config: &AppConfig,
    clock: &Arc<dyn Clock>,
) -> anyhow::Result<(Arc<dyn LeadStore>, Option<PgPool>)> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; leads are kept in memory and lost on restart");
        return Ok((Arc::new(MemoryLeadStore::new(Arc::clone(clock))), None));
    };

    let pool_config = leadfunnel_db::PoolConfig::from_app_config(config);
    let pool = leadfunnel_db::connect_pool(database_url, pool_config).await?;
    leadfunnel_db::run_migrations(&pool).await?;
    Ok((Arc::new(PgLeadStore::new(pool.clone())), Some(pool)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
