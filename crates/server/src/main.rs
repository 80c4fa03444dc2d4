mod bootstrap;
mod chat;
mod health;

use std::time::Duration;

use anyhow::{Context, Result};
use galleria_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use galleria_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let router = chat::router(chat::ChatState { runtime: app.runtime.clone() })
        .merge(health::router(app.db_pool.clone()));

    let address =
        format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding to `{address}`"))?;

    tracing::info!(event_name = "system.server.started", bind_address = %address);

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        wait_for_shutdown().await;
        let _ = drain_tx.send(());
    });

    // In-flight connections get `grace` to drain after the signal; past that
    // the serve future is dropped and the remainder are cut off.
    tokio::select! {
        result = server => result.context("serving the chat endpoint")?,
        _ = drain_deadline(drain_rx, grace) => {
            tracing::warn!(
                event_name = "system.server.drain_timed_out",
                grace_secs = grace.as_secs(),
            );
        }
    }

    tracing::info!(event_name = "system.server.stopping");
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(event_name = "system.server.signal_error", error = %error);
    }
}

/// Resolves `grace` after drain begins; pending until then.
async fn drain_deadline(drain_started: tokio::sync::oneshot::Receiver<()>, grace: Duration) {
    let _ = drain_started.await;
    tokio::time::sleep(grace).await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::drain_deadline;

    #[tokio::test]
    async fn drain_deadline_only_elapses_after_the_signal() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let deadline = drain_deadline(rx, Duration::from_millis(10));
        tokio::pin!(deadline);

        let before = tokio::time::timeout(Duration::from_millis(50), &mut deadline).await;
        assert!(before.is_err());

        let _ = tx.send(());
        let after = tokio::time::timeout(Duration::from_secs(5), &mut deadline).await;
        assert!(after.is_ok());
    }
}
