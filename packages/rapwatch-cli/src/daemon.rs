//! Daemon mode: run the inventory once a day until told to stop.
//!
//! Cycle failures are logged and retried at the next scheduled run; only a
//! bad configuration or an unopenable database stops the daemon at start-up.

use anyhow::{Context, Result};
use rapwatch_core::{scheduler, Config, Inventory, SqliteStore};

/// Run the daily inventory daemon
pub async fn run_daemon(config: Config) -> Result<()> {
    let schedule = config.schedule()?;
    let store = SqliteStore::open(&config.database.path)
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))?;
    let inventory = Inventory::from_config(&config, store)?;

    tracing::info!(
        "Starting daemon: console {}, folder {}, database {}",
        config.console.address,
        config.console.folder_id,
        config.database.path.display()
    );

    let inventory = &inventory;
    scheduler::run(
        schedule,
        move || async move {
            match inventory.run_cycle().await {
                Ok(report) if report.timed_out => {
                    tracing::warn!("Inventory cycle hit its deadline: {:?}", report)
                }
                Ok(report) => tracing::debug!("Inventory cycle report: {:?}", report),
                Err(e) => tracing::error!("Inventory cycle failed: {}", e),
            }
        },
        shutdown_signal(),
    )
    .await;

    tracing::info!("Daemon stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to register SIGTERM handler: {}", e);
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
}
