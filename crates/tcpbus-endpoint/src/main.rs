//! tcpbus demo
//!
//! Starts a server that greets every new connection with `test: "hello"`,
//! then a client that prints whatever it receives. Optional argument: path to
//! a YAML config file.

use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tcpbus_core::error::Result;
use tcpbus_endpoint::{config, ClientEndpoint, ConnHandle, MessageEndpoint, ServerEndpoint};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = match std::env::args().nth(1) {
        Some(path) => config::load_from_file(&path)?,
        None => config::BusConfig::default(),
    };

    let server = ServerEndpoint::from_config(&cfg).await?;
    let greeter = server.clone();
    server.on("connect", move |conn: ConnHandle, _payload: Value| {
        let greeter = greeter.clone();
        async move {
            tracing::info!(%conn, "client connected to server");
            if let Err(e) = greeter.send_to(conn, "test", json!("hello")).await {
                tracing::warn!(%conn, error = %e, "greeting failed");
            }
            true
        }
    });
    server.on("disconnect", |conn: ConnHandle, _payload: Value| async move {
        tracing::info!(%conn, "client left");
        true
    });
    server.run_in_background()?;

    let client = ClientEndpoint::from_config(&cfg).await?;
    client.on("test", |_conn: ConnHandle, payload: Value| async move {
        tracing::info!(%payload, "client received message");
        true
    });
    client.start()?;

    tracing::info!("ctrl+c to stop");
    shutdown_signal().await;

    client.shutdown();
    server.shutdown();
    tracing::info!(metrics = %server.metrics().render(), "server metrics at exit");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
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
    tracing::info!("signal received, shutting down");
}
