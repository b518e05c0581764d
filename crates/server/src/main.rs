use anyhow::Context;
use deployment::{AppDeployment, Deployment};
use server::routes;
use services::services::{config::Config, database_validator::DatabaseValidator};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use utils::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _sentry = logging::init_sentry();
    logging::init_tracing();

    let config = Config::from_env().context("invalid configuration")?;
    let address = format!("{}:{}", config.host, config.port);

    let deployment = AppDeployment::new(config)
        .await
        .context("failed to initialise deployment")?;

    let health = DatabaseValidator::new(deployment.db().pool.clone())
        .validate()
        .await?;
    if health.is_ok() {
        info!("{}", health.summary());
    } else {
        warn!("{}", health.summary());
    }

    let sync_handle = deployment.spawn_background_services();

    let app = routes::router(deployment);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Server running on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sync_handle {
        handle.abort();
    }
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
