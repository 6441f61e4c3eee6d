pub mod rejection;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use tokio::signal::ctrl_c;
use warp::Filter;

use crate::config::Config;
use rejection::handle_rejection;
use state::AppState;

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Initializing state...");
    let state = AppState::new(config).await?;

    let address = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let routes = routes::routes(state)
        .recover(handle_rejection)
        .with(warp::log("foodgram"));

    log::info!("Binding to {address}");
    let (address, server) =
        warp::serve(routes).try_bind_with_graceful_shutdown(address, shutdown_signal())?;

    log::info!("Server running on {address}");
    server.await;

    log::info!("Server shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }

        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {e}");
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
