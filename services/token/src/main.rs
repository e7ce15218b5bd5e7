//! Token service binary.

use auth_token_service::config::Config;
use auth_token_service::http::router;
use auth_token_service::jwt::SigningSecret;
use auth_token_service::notify::LogNotifier;
use auth_token_service::refresh::{ManagerParams, SecretHasher, TokenClass, TokenLifecycleManager};
use auth_token_service::storage::PgCredentialStore;
use auth_token_service::telemetry::{init_tracing, SERVICE_NAME};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Loading config: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.env);
    info!(service = SERVICE_NAME, env = %config.env, "Starting Token Service");

    info!("connecting to the database");
    let store = PgCredentialStore::connect(&config.database_url, config.database_max_connections).await?;

    info!("applying database migrations");
    store.migrate().await?;

    let manager = Arc::new(TokenLifecycleManager::new(ManagerParams {
        issuer: config.jwt_issuer.clone(),
        access: TokenClass::new(
            SigningSecret::new(config.access_token_secret.clone()),
            config.access_token_ttl,
        ),
        refresh: TokenClass::new(
            SigningSecret::new(config.refresh_token_secret.clone()),
            config.refresh_token_ttl,
        ),
        hasher: SecretHasher::default(),
        alert_recipient: config.alert_recipient.clone(),
        store: Arc::new(store),
        notifier: Arc::new(LogNotifier::new()),
    }));

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    info!(addr = %config.addr(), "Token Service listening");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let app = router(manager).into_make_service_with_connect_info::<SocketAddr>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            result??;
            return Ok(());
        }
        () = shutdown_signal() => {}
    }

    info!("shutting down the server");
    let _ = stop_tx.send(());

    match tokio::time::timeout(config.shutdown_timeout, server).await {
        Ok(result) => result??,
        Err(_) => warn!(timeout = ?config.shutdown_timeout, "graceful shutdown timed out"),
    }

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
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
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
