use anyhow::{Context, Result};
use rwalent_notifications::{
    config::Config, logging, metrics, surfaces::Dropdown, Session, SessionEvent,
};
use tokio::signal;
use tracing::{info, warn};

fn main() -> Result<()> {
    // Build custom runtime with explicit thread configuration
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(num_cpus::get);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async {
        // Initialize logging first thing
        logging::setup_logging();
        // Load environment variables from .env file if present
        dotenv::dotenv().ok();

        info!("Starting Rwalent notification client");

        // Load configuration
        let config = Config::from_env()?;
        let token = config
            .token
            .clone()
            .context("RWALENT_TOKEN must be set")?;

        // Sign in and start the shared polling driver
        let session = Session::login(&config, token)?;
        let expiry_watcher = session.watch_expiry();
        let mut session_events = session.credentials().subscribe();
        let mut toasts = session.notices().subscribe();
        session.ensure_polling().await;

        // Render the dropdown whenever the store changes until shutdown or expiry
        let mut dropdown = Dropdown::new(&session, config.dropdown_limit);

        loop {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal, logging out");
                    session.logout().await;
                    break;
                }
                event = session_events.recv() => {
                    if let Ok(SessionEvent::Expired) = event {
                        warn!("Session expired, sign in again to keep receiving notifications");
                        break;
                    }
                }
                toast = toasts.recv() => {
                    if let Ok(toast) = toast {
                        warn!(level = ?toast.level, "{}", toast.message);
                    }
                }
                alive = dropdown.changed() => {
                    if !alive {
                        break;
                    }
                    let view = dropdown.render();
                    info!(
                        badge = view.badge.as_deref().unwrap_or("0"),
                        rows = view.rows.len(),
                        "Notifications updated"
                    );
                    for row in &view.rows {
                        info!(id = row.id, read = row.is_read, when = %row.time_ago, "{}", row.message);
                    }
                }
            }
        }

        // Wait for the expiry watcher, which exits once the session is gone
        let _ = expiry_watcher.await;
        info!(metrics = %metrics::metrics_text(), "Shutdown complete");
        Ok(())
    })
}
