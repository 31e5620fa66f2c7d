// Main entry point for config-relay

use anyhow::Context;
use config_relay::app::{Collaborators, Relay};
use config_relay::client::{HttpCallbackClient, HttpIdentityVerifier};
use config_relay::config::Config;
use config_relay::core::traits::{ConfigStore, RegistrationStore};
use config_relay::state::{
    InMemoryConfigStore, InMemoryRegistrationStore, PgConfigStore, PgRegistrationStore,
    SessionCache,
};

use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration before any logging
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Tracing, initialised exactly once
    init_tracing(&config);

    info!("Starting config-relay");
    info!(
        bind_address = %config.bind_address,
        port = config.port,
        database = config.database_url.is_some(),
        console = config.operator_console,
        "Configuration loaded"
    );

    // 3. Storage: Postgres when configured, in-memory otherwise
    let (registrations, configs) = init_stores(&config).await?;

    // 4. Remote collaborators
    let identity = Arc::new(
        HttpIdentityVerifier::new(&config.identity_session_url, config.identity_timeout_secs)
            .context("identity client")?,
    );
    let callbacks = Arc::new(
        HttpCallbackClient::new(config.callback_timeout_secs).context("callback client")?,
    );
    info!(identity_url = %config.identity_session_url, "HTTP clients initialized");

    // 5. Wire services
    let relay = Relay::assemble(
        config.clone(),
        Collaborators {
            registrations,
            configs,
            identity,
            callback_verifier: callbacks.clone(),
            delivery: callbacks,
        },
    )
    .context("assemble services")?;

    let shutdown = CancellationToken::new();

    // 6. Session cache housekeeping
    spawn_session_purge(
        Arc::clone(&relay.sessions),
        Duration::from_secs(config.session_purge_interval_secs),
        shutdown.clone(),
    );

    // 7. Operator console on stdin
    if config.operator_console {
        let console = relay.console();
        let token = shutdown.clone();
        tokio::spawn(async move {
            let exit = console
                .run(BufReader::new(tokio::io::stdin()), token)
                .await;
            info!(exit = ?exit, "Operator console finished");
        });
    }

    // 8. HTTP server
    let router = relay.router();
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {}", addr))?;

    info!(addr = %addr, "Server listening");

    let server_token = shutdown.clone();
    let served = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_token.cancel();
        })
        .await;

    shutdown.cancel();
    if let Err(ref e) = served {
        error!(error = %e, "Server error");
    }

    // 9. Drain detached notification work
    if relay.tasks.shutdown(config.shutdown_drain()).await {
        info!("Background jobs drained");
    } else {
        warn!("Shutdown drain timed out, abandoning remaining jobs");
    }

    info!("Server shutdown complete");

    // A pending stdin read cannot be cancelled and would hold the runtime open
    if config.operator_console {
        std::process::exit(if served.is_ok() { 0 } else { 1 });
    }
    served.context("serve")
}

type Stores = (Arc<dyn RegistrationStore>, Arc<dyn ConfigStore>);

async fn init_stores(config: &Config) -> anyhow::Result<Stores> {
    let Some(ref database_url) = config.database_url else {
        info!("Using in-memory storage");
        return Ok((
            Arc::new(InMemoryRegistrationStore::new()),
            Arc::new(InMemoryConfigStore::new()),
        ));
    };

    let pool = sqlx::PgPool::connect(database_url)
        .await
        .context("connect to database")?;

    let registrations = PgRegistrationStore::new(pool.clone());
    registrations
        .ensure_schema()
        .await
        .context("registrations schema")?;
    let configs = PgConfigStore::new(pool);
    configs.ensure_schema().await.context("configs schema")?;

    info!("Database pool initialized");
    Ok((Arc::new(registrations), Arc::new(configs)))
}

fn spawn_session_purge(sessions: Arc<SessionCache>, every: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let purged = sessions.purge_expired().await;
                    if purged > 0 {
                        debug!(purged, "Expired sessions purged");
                    }
                }
            }
        }
    });
}

/// Initialize tracing subscriber based on configuration
fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    // RUST_LOG wins over LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_env_filter(filter);

    if config.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            info!("SIGTERM received, starting graceful shutdown");
        },
    }
}
