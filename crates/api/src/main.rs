use std::sync::Arc;

use anyhow::Context;

use payd_auth::{SESSION_COOKIE, SessionCookie, SessionTokenCodec};
use payd_infra::config::AppConfig;
use payd_infra::provider::KratosClient;
use payd_infra::store::PostgresStore;
use payd_infra::{IdentityOrchestrator, IdentityService, RoleCache, RoleCatalog};
use payd_observability::LogConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;

    payd_observability::init(&LogConfig {
        level: config.log_level.clone(),
    });

    let store = PostgresStore::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    let role_cache = Arc::new(
        RoleCache::new(store.clone(), config.role_refresh_interval)
            .context("invalid role refresh interval")?,
    );
    let role_refresh = role_cache
        .start()
        .await
        .context("failed to load role catalog")?;
    let catalog: Arc<dyn RoleCatalog> = role_cache;

    let provider = KratosClient::new(&config.provider.admin_url, &config.provider.public_url);
    let codec = SessionTokenCodec::new(config.session.secret.as_bytes())
        .context("invalid session secret")?;

    let orchestrator = IdentityOrchestrator::new(provider, store, catalog, codec)
        .with_session_ttl(config.session.ttl);

    if let Some(admin) = &config.bootstrap_admin {
        match orchestrator
            .bootstrap_admin(&admin.email, &admin.name, &admin.password)
            .await
            .context("failed to bootstrap admin account")?
        {
            Some(employee_id) => tracing::info!(%employee_id, "admin account bootstrapped"),
            None => tracing::info!("admin account present"),
        }
    }

    let cookie = SessionCookie {
        max_age_secs: config.session.ttl.as_secs(),
        ..SESSION_COOKIE
    };
    let identity: Arc<dyn IdentityService> = Arc::new(orchestrator);
    let app = payd_api::app::build_app(identity, cookie);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind 0.0.0.0:{}", config.port))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    role_refresh.shutdown().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
