//! Email-sending MCP server.
//!
//! Run with: `EMAIL_ACCOUNT=... EMAIL_PASSWORD=... cargo run -p mailmcp-server`
//!
//! Clients open `GET /sse`, then post JSON-RPC requests to the advertised
//! message endpoint.

use std::sync::Arc;

use anyhow::Context;
use mailmcp_core::{MailConfig, ServerConfig, ToolDispatcher, ToolRegistry};
use mailmcp_session::SessionManager;
use mailmcp_smtp::SmtpMailSender;
use mailmcp_transport::create_router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mail_config = Arc::new(MailConfig::from_env().context("Invalid mail configuration")?);
    let server_config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(?mail_config, "Loaded configuration");

    let registry = ToolRegistry::builtin().context("Failed to build tool registry")?;
    let sender = SmtpMailSender::new(Arc::clone(&mail_config))
        .context("Failed to configure SMTP relay")?;
    let dispatcher = ToolDispatcher::new(Arc::new(registry), Arc::new(sender));
    let manager = Arc::new(SessionManager::new(Arc::new(dispatcher)));

    let app = create_router(Arc::clone(&manager));

    let addr = server_config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("Server listening on http://{addr}");
    tracing::info!("SSE endpoint: http://{addr}/sse");
    tracing::info!("Message endpoint: http://{addr}/messages");
    tracing::info!("Health check: http://{addr}/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(manager))
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then close all sessions so their streams
/// end once in-flight results are delivered.
async fn shutdown_signal(manager: Arc<SessionManager>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    manager.shutdown();
}
