//! Daemon wiring: builds the backends from configuration, spawns the
//! orchestrator router and the discovery scheduler, and coordinates
//! shutdown through a `CancellationToken` tree.

mod services;

use std::sync::Arc;

use futures::FutureExt;
use ingest::Scheduler;
use inlet_core::Config;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use services::{Services, discovery_pass};

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Ingest(#[from] ingest::IngestError),
}

pub type Result<T> = std::result::Result<T, DaemonError>;

/// Long-running daemon process.
pub struct Daemon {
  config: Config,
}

impl Daemon {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  /// Run until ctrl-c. Discovery is scheduler-driven: one adaptive job per
  /// configured scope, each triggering an ingestion pass through the
  /// router.
  pub async fn run(self) -> Result<()> {
    let cancel = CancellationToken::new();
    let services = Services::build(&self.config, cancel.child_token());
    info!(scopes = services.scopes.len(), "daemon starting");

    let mut scheduler = Scheduler::new(self.config.scheduler.clone(), cancel.child_token());
    for scope in &services.scopes {
      let router = services.router.clone();
      let scope_id = scope.id.clone();
      scheduler.register(
        scope_id.to_string(),
        Arc::new(move || {
          let router = router.clone();
          let scope_id = scope_id.clone();
          async move { discovery_pass(&router, &scope_id).await }.boxed()
        }),
      );
    }
    let scheduler_task = tokio::spawn(scheduler.run());

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    cancel.cancel();
    services.router.shutdown_all().await;
    if let Err(e) = scheduler_task.await {
      warn!(error = %e, "scheduler task did not shut down cleanly");
    }
    info!("daemon stopped");
    Ok(())
  }
}
