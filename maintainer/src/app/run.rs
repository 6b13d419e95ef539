//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::clock::SystemClock;
use crate::errors::MaintainerError;
use crate::maintenance::job::{self, MaintenanceJob};
use crate::maintenance::build_maintainers;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the node maintainer until `shutdown_signal` completes
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), MaintainerError> {
    info!("Initializing node maintainer...");
    let state = Arc::new(AppState::init(&options, Arc::new(SystemClock)).await?);
    run_with_state(state, options, shutdown_signal).await
}

/// Run with prepared collaborators
pub async fn run_with_state(
    state: Arc<AppState>,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), MaintainerError> {
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager =
        ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone(), state.clone());

    if let Err(e) = init(&state, &options, &shutdown_tx, &mut shutdown_manager).await {
        error!("Failed to start node maintainer: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    state: &Arc<AppState>,
    options: &AppOptions,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), MaintainerError> {
    let maintainers = build_maintainers(
        state.maintainer_context(options),
        state.clock.clone(),
        &options.intervals,
    );

    for maintainer in maintainers {
        init_maintenance_job(
            maintainer,
            state,
            options.job.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        );
    }

    if options.enable_admin_server {
        init_admin_server(options, state, shutdown_manager, shutdown_tx.subscribe()).await?;
    }

    Ok(())
}

fn init_maintenance_job(
    maintainer: Arc<dyn MaintenanceJob>,
    state: &Arc<AppState>,
    options: job::Options,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!("Initializing {}...", maintainer.name());

    let name = maintainer.name().to_string();
    let job_control = state.job_control.clone();

    let handle = tokio::spawn(async move {
        job::run(
            maintainer.as_ref(),
            job_control.as_ref(),
            &options,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_job_handle(name, handle);
}

async fn init_admin_server(
    options: &AppOptions,
    state: &Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), MaintainerError> {
    info!("Initializing admin HTTP server...");

    let server_state = ServerState::new(
        state.job_control.clone(),
        state.nodes.clone(),
        state.locks.clone(),
    );

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Arc<AppState>,
    job_handles: Vec<(String, JoinHandle<()>)>,
    server_handle: Option<JoinHandle<Result<(), MaintainerError>>>,
}

impl ShutdownManager {
    fn new(
        shutdown_tx: broadcast::Sender<()>,
        lifecycle_options: LifecycleOptions,
        app_state: Arc<AppState>,
    ) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state,
            job_handles: Vec::new(),
            server_handle: None,
        }
    }

    fn with_job_handle(&mut self, name: String, handle: JoinHandle<()>) {
        self.job_handles.push((name, handle));
    }

    fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), MaintainerError>>,
    ) -> Result<(), MaintainerError> {
        if self.server_handle.is_some() {
            return Err(MaintainerError::ShutdownError(
                "server_handle already set".to_string(),
            ));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), MaintainerError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(self.lifecycle_options.max_shutdown_delay, self.shutdown_impl())
            .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, abandoning running jobs",
                    self.lifecycle_options.max_shutdown_delay
                );
                for (_, handle) in self.job_handles.drain(..) {
                    handle.abort();
                }
                Err(MaintainerError::ShutdownError("timed out".to_string()))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), MaintainerError> {
        info!("Shutting down node maintainer...");

        // 1. Maintenance jobs finish their current pass
        while let Some((name, handle)) = self.job_handles.first_mut() {
            if let Err(e) = handle.await {
                error!("{} did not stop cleanly: {}", name, e);
            }
            self.job_handles.remove(0);
        }

        // 2. Admin server
        if let Some(handle) = self.server_handle.take() {
            handle
                .await
                .map_err(|e| MaintainerError::ShutdownError(e.to_string()))??;
        }

        // 3. App state
        self.app_state.shutdown().await?;

        info!("Shutdown complete");
        Ok(())
    }
}
