use std::{fs::OpenOptions, net::SocketAddr, path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use rideshare_data_management::DataManager;
use server::{
    config::Config,
    notify::{dispatch, HttpMailer, LogMailer, Notifier, RetryPolicy},
    routes::router,
    server_state::ServerState,
};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config.log_dir)?;

    tracing::info!("Starting server...");
    config.log_summary();

    let data_manager = DataManager::start(&config.database_path).await
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;

    let (notifier, outbox) = Notifier::new(config.mail_from.clone());
    let policy = RetryPolicy::new(config.mail_max_attempts, config.mail_retry_backoff);
    let dispatcher = match &config.mail_relay_url {
        Some(url) => {
            let mailer = HttpMailer::new(url.clone()).context("Failed to build mail relay client")?;
            tokio::spawn(dispatch(outbox, mailer, policy))
        }
        None => {
            tracing::warn!("MAIL_RELAY_URL not set, notifications will only be logged");
            tokio::spawn(dispatch(outbox, LogMailer, policy))
        }
    };

    let addr = SocketAddr::from((config.bind, config.port));
    let server_state = Arc::new(ServerState {
        data_manager,
        notifier,
        config,
    });

    let app = router(server_state.clone());

    let listener = TcpListener::bind(addr).await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The dispatcher drains its queue once the last notifier handle is dropped
    drop(server_state);
    match tokio::time::timeout(Duration::from_secs(30), dispatcher).await {
        Ok(result) => result.context("Notification dispatcher panicked")?,
        Err(_) => tracing::warn!("Pending notifications were not sent before shutdown"),
    }

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("server.log"))
        .with_context(|| format!("Failed to open log file in {:?}", log_dir))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=trace,rideshare_data_management=trace,tower_http=debug", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        .init();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                tracing::error!("Failed to listen for Ctrl+C: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!("Failed to install terminate handler: {err}");
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
