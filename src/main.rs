use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use taskq::config::Settings;
use taskq::queue::Worker;
use taskq::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    taskq::logging::init();

    let settings = Settings::load()?;
    info!(
        bind_addr = %settings.server.bind_addr,
        capacity = settings.queue.capacity,
        "starting taskq"
    );

    let service = Arc::new(settings.queue.build_service());
    let processor = Arc::new(settings.worker.build_processor());
    let worker = Worker::new(Arc::clone(&service), processor, CancellationToken::new()).spawn();

    let app = Arc::new(taskq::api::app_with(service, settings.server.build_cors()));
    let server = Server::bind(&settings.server.bind_addr).await?;
    server
        .run(
            move |req| {
                let app = Arc::clone(&app);
                async move { app.handle(req).await }
            },
            shutdown_signal(),
        )
        .await?;

    info!("stopping worker");
    if let Err(e) = worker.shutdown(settings.server.shutdown_grace()).await {
        error!(error = %e, "worker did not stop cleanly");
    }

    info!("taskq stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
