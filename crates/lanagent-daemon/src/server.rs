//! Web server setup and routing

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::announce::{announcer, local_hostname, Announcement};
use crate::api;
use crate::state::AppState;

/// Build the HTTP router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/scan", get(api::scan_results))
        .fallback(api::not_found)
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the web server, the scan loop and the service announcement until a
/// shutdown signal arrives
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bind = state.config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let local_addr = listener.local_addr()?;
    info!(address = %local_addr, "Starting web server");
    info!("Scan results at http://{}/scan", local_addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start the scan loop in background
    let scan_loop = {
        let scanner = state.scanner.clone();
        let cache = state.cache.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { scanner.run(cache, shutdown).await })
    };

    // Announce on the scanned interface's address when one is known
    let announce_ip = advertised_ip(local_addr.ip(), state.config.discovery.interface.as_deref());
    let announcer = announcer(&state.config.announce);
    let announcement = Announcement::new(
        &state.config.announce,
        &local_hostname(),
        announce_ip,
        local_addr.port(),
    );
    if let Err(e) = announcer.announce(&announcement) {
        warn!(error = %e, "Failed to announce service");
    }

    tokio::spawn(forward_shutdown_signal(shutdown_tx.clone()));

    let mut server_shutdown = shutdown_rx.clone();
    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|&stop| stop).await;
        })
        .await;

    info!("Shutting down");
    if let Err(e) = announcer.withdraw() {
        warn!(error = %e, "Failed to withdraw service announcement");
    }

    stop_scan_loop(&shutdown_tx, scan_loop).await;

    served?;
    Ok(())
}

/// Signal the scan loop to stop and let an in-flight scan finish
///
/// Also reached when the server exits on an error, with no signal received.
async fn stop_scan_loop(shutdown: &watch::Sender<bool>, scan_loop: JoinHandle<()>) {
    let _ = shutdown.send(true);
    if let Err(e) = scan_loop.await {
        error!(error = %e, "Scan loop terminated abnormally");
    }
}

/// Address to advertise: the bind address if it is specific, otherwise the
/// address of the interface the scanner uses
fn advertised_ip(bound: IpAddr, interface: Option<&str>) -> Option<Ipv4Addr> {
    match bound {
        IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => lanagent_discovery::detect_interface(interface)
            .map(|iface| iface.ip)
            .ok(),
    }
}

/// Flip the shutdown channel on Ctrl-C or SIGTERM
async fn forward_shutdown_signal(shutdown: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
    let _ = shutdown.send(true);
}
