use std::{net::SocketAddr, sync::Arc};

use sea_orm_migration::MigratorTrait;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bottega_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = api::config::AppConfig::load()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = Arc::new(api::db::establish_connection(&config.database_url).await?);
    if config.auto_migrate {
        api::migrator::Migrator::up(&*db, None).await.map_err(|e| {
            error!("migrations failed: {}", e);
            e
        })?;
    }

    let (event_sender, _event_consumer) = api::events::channel(1024);
    let gateway = Arc::new(api::messaging::LoggingGateway);
    let renderer = Arc::new(api::documents::PlainTextRenderer);

    let state = Arc::new(api::AppState::build(
        db,
        config.clone(),
        event_sender,
        gateway,
        renderer,
    ));
    let workers = api::workers::spawn_all(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, api::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for worker in workers {
        worker.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install ctrl-c handler: {}", e);
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("failed to install SIGTERM handler: {}", e),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
