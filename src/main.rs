//! parachain-sentinel server entry point.
//!
//! Wires the store, chain adapter, alert engine and scheduler, starts the
//! jobs and serves the REST and WebSocket endpoints until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use parachain_sentinel::aggregator::{
    ChainRpc, CoinGeckoPrice, DataAggregator, FixedPrice, PriceSource, SidecarClient,
};
use parachain_sentinel::api;
use parachain_sentinel::app_state::AppState;
use parachain_sentinel::config::{MonitorConfig, NotifySettings};
use parachain_sentinel::domain::{EventBus, WriteLocks};
use parachain_sentinel::engine::{AlertChecker, AlertEngine};
use parachain_sentinel::notify::{
    EmailChannel, NotificationChannel, NotificationDispatcher, WebhookChannel,
};
use parachain_sentinel::scheduler::{FailureTracker, JobContext, Scheduler};
use parachain_sentinel::service::{AlertService, ParachainService};
use parachain_sentinel::store::{
    AlertRepository, InMemoryStore, MetricRepository, ParachainRepository, PostgresStore,
};

/// The three repository views of one store backend.
struct Repositories {
    metrics: Arc<dyn MetricRepository>,
    alerts: Arc<dyn AlertRepository>,
    parachains: Arc<dyn ParachainRepository>,
}

impl Repositories {
    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: MetricRepository + AlertRepository + ParachainRepository + 'static,
    {
        Self {
            metrics: Arc::clone(&store) as Arc<dyn MetricRepository>,
            alerts: Arc::clone(&store) as Arc<dyn AlertRepository>,
            parachains: store as Arc<dyn ParachainRepository>,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = MonitorConfig::from_env().map_err(|e| anyhow::anyhow!("configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting parachain-sentinel");

    // Build storage
    let repos = if config.persistence_enabled {
        let store = PostgresStore::connect(
            &config.database_url,
            config.database_max_connections,
            config.database_min_connections,
            Duration::from_secs(config.database_connect_timeout_secs),
        )
        .await
        .context("connecting to PostgreSQL")?;
        tracing::info!("using PostgreSQL store");
        Repositories::from_store(Arc::new(store))
    } else {
        tracing::info!("persistence disabled, using in-memory store");
        Repositories::from_store(Arc::new(InMemoryStore::new()))
    };
    for parachain in &config.monitored_parachains {
        repos
            .parachains
            .register(parachain)
            .await
            .with_context(|| format!("registering parachain {}", parachain.id))?;
    }
    tracing::info!(count = config.monitored_parachains.len(), "parachains registered");

    // Build chain access
    let rpc = SidecarClient::new(&config.rpc_url, config.aggregator.connect_timeout)
        .context("building sidecar client")?;
    let price: Arc<dyn PriceSource> = match &config.price_api_url {
        Some(url) => Arc::new(
            CoinGeckoPrice::new(url.as_str(), config.dot_price_usd)
                .context("building price client")?,
        ),
        None => Arc::new(FixedPrice(config.dot_price_usd)),
    };
    let aggregator = Arc::new(DataAggregator::new(
        Arc::new(rpc) as Arc<dyn ChainRpc>,
        price,
        config.aggregator,
    ));

    // Build alerting
    let event_bus = EventBus::new(config.event_bus_capacity);
    let dispatcher = NotificationDispatcher::new(channels(&config.notify)?);
    tracing::info!(channels = dispatcher.channel_count(), "notification channels ready");
    let engine = Arc::new(AlertEngine::new(
        Arc::clone(&repos.alerts),
        dispatcher,
        event_bus.clone(),
        config.alerts.cooldown,
    ));
    let checker = Arc::new(AlertChecker::new(
        engine,
        Arc::clone(&repos.metrics),
        Arc::clone(&repos.parachains),
        config.alerts,
    ));

    // Build scheduler
    let ctx = JobContext {
        aggregator: Arc::clone(&aggregator),
        metrics: Arc::clone(&repos.metrics),
        parachains: Arc::clone(&repos.parachains),
        checker,
        locks: Arc::new(WriteLocks::new()),
        failures: Arc::new(FailureTracker::new()),
        settings: config.scheduler,
    };
    let scheduler = Scheduler::new(ctx, &config.scheduler);
    scheduler
        .initialize()
        .await
        .context("starting the job scheduler")?;

    // Build application state
    let app_state = AppState {
        alert_service: Arc::new(AlertService::new(
            Arc::clone(&repos.alerts),
            event_bus.clone(),
        )),
        parachain_service: Arc::new(ParachainService::new(
            Arc::clone(&repos.parachains),
            Arc::clone(&repos.metrics),
            aggregator,
        )),
        scheduler: scheduler.clone(),
        event_bus,
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, api::build_app(app_state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
        })
        .await?;

    scheduler.stop().await;
    tracing::info!("parachain-sentinel stopped");
    Ok(())
}

/// Notification channels enabled by the configuration.
fn channels(settings: &NotifySettings) -> anyhow::Result<Vec<Arc<dyn NotificationChannel>>> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
    if let Some(url) = &settings.webhook_url {
        channels.push(Arc::new(
            WebhookChannel::new(url.as_str()).context("building webhook channel")?,
        ));
    }
    if let Some(key) = &settings.email_api_key
        && !settings.email_to.is_empty()
    {
        channels.push(Arc::new(
            EmailChannel::new(
                &settings.email_api_url,
                key,
                &settings.email_from,
                settings.email_to.clone(),
            )
            .context("building email channel")?,
        ));
    }
    Ok(channels)
}
