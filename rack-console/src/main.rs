//! rack-console - headless warehouse dashboard core
//!
//! Wires the backend client, session controller and data store from env,
//! logs session and catalog changes, and runs until Ctrl-C.

use rack_client::RestBackend;
use rack_console::logger::init_logger_with_file;
use rack_console::{
    BackgroundTasks, ConsoleConfig, DataStore, LocalMirror, RefreshWorker, SessionController,
    TaskKind,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = ConsoleConfig::from_env();
    init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())?;

    tracing::info!(
        backend = %config.client.url,
        data_dir = %config.data_dir.display(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting rack-console"
    );

    let backend = Arc::new(RestBackend::new(config.client.clone())?);
    let mirror = Arc::new(LocalMirror::open(&config.data_dir)?);
    let mut tasks = BackgroundTasks::new();

    tasks.register(
        "realtime_listener",
        TaskKind::Listener,
        backend.connect_realtime(tasks.child_token()),
    );

    let store = DataStore::open(backend.clone(), mirror.clone(), tasks.child_token());
    let worker = RefreshWorker::new(store.clone());
    tasks.spawn("refresh_worker", TaskKind::Worker, |_| worker.run());

    let session = SessionController::new(
        backend.clone(),
        mirror,
        config.session_options(),
        tasks.child_token(),
    );
    session.start();

    // Report session changes and navigation requests
    let mut snapshots = session.subscribe();
    let mut navigation = session.subscribe_navigation();
    let watcher = session.clone();
    tasks.spawn("session_watcher", TaskKind::Listener, |token| async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    let pages: Vec<_> = watcher
                        .visible_navigation()
                        .into_iter()
                        .map(|n| n.page.as_str())
                        .collect();
                    tracing::info!(
                        phase = ?snapshot.phase,
                        user = ?snapshot.profile.as_ref().map(|p| p.email.as_str()),
                        loading = snapshot.loading,
                        ?pages,
                        "Session changed"
                    );
                }
                Ok(request) = navigation.recv() => {
                    tracing::info!(path = request.path, "Navigation requested");
                }
            }
        }
    });

    let mut revisions = store.subscribe();
    let reporter = store.clone();
    tasks.spawn("catalog_watcher", TaskKind::Listener, |token| async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                changed = revisions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let catalog = reporter.snapshot();
                    tracing::info!(
                        products = catalog.products.len(),
                        racks = catalog.racks.len(),
                        categories = catalog.categories.len(),
                        product_codes = catalog.product_codes.len(),
                        users = catalog.users.len(),
                        pending = catalog.pending_count(),
                        "Catalog updated"
                    );
                }
            }
        }
    });

    tasks.log_summary();

    if let Some((email, password)) = &config.login
        && !session.login(email, password).await
    {
        tracing::warn!(%email, "Startup login was rejected");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    session.shutdown();
    store.shutdown();
    if let Err(e) = store.save_snapshot() {
        tracing::warn!(error = %e, "Failed to save catalog on shutdown");
    }
    tasks.shutdown().await;

    Ok(())
}
