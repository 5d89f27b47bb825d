use siteflow::api;
use siteflow::clients::{
    BuildSettings, GitHubHost, HttpAnalyticsProvider, HttpDomainRegistrar, HttpSiteRecordStore,
    VercelPlatform,
};
use siteflow::config::Config;
use siteflow::db;
use siteflow::domain::DomainService;
use siteflow::jobs::maintenance::run_sweeper;
use siteflow::jobs::{InMemoryJobStore, JobStore, PgJobStore};
use siteflow::poller::ReadinessConfig;
use siteflow::workflow::{Collaborators, Orchestrator, WorkflowSettings};

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// One event loop: workflows interleave as tasks, never as threads.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,siteflow=debug,sqlx=warn")),
        )
        .init();

    let cfg = Config::from_env()?;

    tracing::info!(
        bind_addr = %cfg.bind_addr,
        store = if cfg.database_url.is_some() { "postgres" } else { "memory" },
        job_ttl_secs = cfg.job_ttl_secs,
        readiness_attempts = cfg.readiness_attempts,
        readiness_delay_ms = cfg.readiness_delay_ms,
        call_timeout_secs = cfg.call_timeout_secs,
        migrate_on_startup = cfg.migrate_on_startup,
        "siteflow starting"
    );

    // ---- Job store ----
    let store: Arc<dyn JobStore> = match &cfg.database_url {
        Some(url) => {
            let store = PgJobStore::connect_lazy(url, cfg.job_ttl())?;
            if cfg.migrate_on_startup {
                db::run_migrations(store.pool()).await?;
            }
            Arc::new(store)
        }
        None => {
            tracing::warn!("no database configured, job records will not survive a restart");
            Arc::new(InMemoryJobStore::with_ttl(cfg.job_ttl()))
        }
    };
    if let Err(e) = store.connect().await {
        // Provisioning does not depend on job visibility.
        tracing::warn!(error = %e, "job store not reachable at startup");
    }

    // ---- Collaborators ----
    let client_timeout = cfg.call_timeout();
    let registrar = Arc::new(HttpDomainRegistrar::new(
        cfg.registrar.base_url.clone(),
        cfg.registrar.token.clone(),
        client_timeout,
    )?);
    let platform = Arc::new(VercelPlatform::new(
        cfg.platform.base_url.clone(),
        cfg.platform.token.clone(),
        cfg.platform_team_id.clone(),
        client_timeout,
    )?);
    let source = Arc::new(GitHubHost::new(
        cfg.source_host.base_url.clone(),
        cfg.source_host.token.clone(),
        cfg.repo_owner.clone(),
        cfg.template_owner.clone(),
        cfg.template_repo.clone(),
        client_timeout,
    )?);
    let records = Arc::new(HttpSiteRecordStore::new(
        cfg.records.base_url.clone(),
        cfg.records.token.clone(),
        client_timeout,
    )?);
    let analytics = Arc::new(HttpAnalyticsProvider::new(
        cfg.analytics.base_url.clone(),
        cfg.analytics.token.clone(),
        client_timeout,
    )?);

    let collaborators = Collaborators {
        registrar: registrar.clone(),
        platform: platform.clone(),
        source,
        records: records.clone(),
        analytics,
    };

    let settings = WorkflowSettings {
        readiness: ReadinessConfig {
            max_attempts: cfg.readiness_attempts,
            delay: cfg.readiness_delay(),
            call_timeout: cfg.call_timeout(),
            ..ReadinessConfig::default()
        },
        call_timeout: cfg.call_timeout(),
        build: BuildSettings::default(),
    };

    let orchestrator = Orchestrator::new(store.clone(), collaborators, settings);
    let domains = DomainService::new(registrar, platform, cfg.call_timeout()).with_records(records);

    // ---- API task ----
    let app = api::router(api::ApiState {
        orchestrator,
        domains,
        api_secret: Arc::from(cfg.api_secret.as_str()),
    });
    let bind_addr = cfg.bind_addr.clone();
    let api_handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        tracing::info!(addr = %bind_addr, "api listening");
        axum::serve(listener, app).await?;
        Ok::<(), anyhow::Error>(())
    });

    // ---- TTL sweeper ----
    let sweep_interval = Duration::from_secs(cfg.sweep_interval_secs.max(1));
    let sweeper_handle = tokio::spawn(run_sweeper(store.clone(), sweep_interval));

    tokio::select! {
        res = api_handle => res??,
        res = sweeper_handle => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }

    store.disconnect().await;
    Ok(())
}
