use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use lib_ticketwatch::loggers::{LogSettings, init_tracing};
use lib_ticketwatch::retrieve::AutotaskClient;
use lib_ticketwatch::{ConnectionRegistry, CredentialVault, SyncEngine, TicketCache, TicketSource};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod ticket_logic;
use ticket_logic::{config, web};

#[tokio::main]
/// # Main Entry Point
///
/// 1.  Loads `.env`, CLI/env flags and the optional JSON config file.
/// 2.  Sets up console + rolling JSON file logging.
/// 3.  Builds the vault, cache, registry and Autotask client, and starts the
///     sync engine's poll, heartbeat and broadcaster tasks.
/// 4.  Serves the web routes until SIGINT/SIGTERM. In-flight requests are
///     drained (so a vault write completes) before the engine is cancelled.
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let (settings, warnings) = config::load_settings();
    let _log_guard = init_tracing(&LogSettings {
        log_dir: settings.log_dir.clone(),
        file_prefix: "server_tickets".to_string(),
        default_level: settings.log_level.clone(),
    })?;
    for warning in warnings {
        warn!("{}", warning);
    }

    let policy = settings.policy.clone();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = settings.port,
        poll_secs = policy.poll_interval.as_secs(),
        active_start = policy.active_hours.start(),
        active_end = policy.active_hours.end(),
        vault = %settings.vault_path.display(),
        "Starting ticket server"
    );

    let vault = Arc::new(CredentialVault::new(&settings.vault_path));
    if vault.encrypted_file_present() {
        info!("Encrypted credentials found, waiting for unlock");
    } else {
        info!("No saved credentials, waiting for entry");
    }

    let source: Arc<dyn TicketSource> = Arc::new(AutotaskClient::new(
        &settings.api_base_url,
        settings.request_timeout,
    )?);
    let engine = Arc::new(SyncEngine::new(
        vault,
        Arc::new(TicketCache::new()),
        Arc::new(ConnectionRegistry::new(settings.write_timeout)),
        source,
        policy,
    ));

    let token = CancellationToken::new();
    let tasks = engine.spawn(token.clone());

    let app = web::router(
        web::AppState {
            engine: Arc::clone(&engine),
        },
        settings.log_http,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    token.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Engine task ended abnormally");
        }
    }

    info!("Shutdown complete.");
    Ok(())
}

/// Resolves on the first of CTRL+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => info!("SIGTERM received, initiating shutdown."),
    }
}
