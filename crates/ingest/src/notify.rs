//! Outbound notification events for UI / pub-sub consumption.
//!
//! Events are fire-and-forget: a sink must never fail the orchestration,
//! so publishing returns nothing.

use std::sync::Mutex;

use async_trait::async_trait;
use inlet_core::RunId;
use tracing::info;

/// Progress events emitted by the orchestrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
  Started {
    run_id: RunId,
    scope: String,
    total: usize,
  },
  Progress {
    run_id: RunId,
    scope: String,
    processed: usize,
    failed: usize,
    total: usize,
  },
  Completed {
    run_id: RunId,
    scope: String,
    processed: usize,
    failed: usize,
    total: usize,
    success: bool,
  },
  Failed {
    run_id: RunId,
    scope: String,
    reason: String,
  },
}

/// Fire-and-forget event sink.
#[async_trait]
pub trait NotificationSink: Send + Sync {
  async fn publish(&self, event: NotificationEvent);
}

/// Default sink: events land in the log.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
  async fn publish(&self, event: NotificationEvent) {
    match event {
      NotificationEvent::Started { run_id, scope, total } => {
        info!(run = %run_id, scope = %scope, total, "run started");
      }
      NotificationEvent::Progress {
        run_id,
        scope,
        processed,
        failed,
        total,
      } => {
        info!(run = %run_id, scope = %scope, processed, failed, total, "run progress");
      }
      NotificationEvent::Completed {
        run_id,
        scope,
        processed,
        failed,
        total,
        success,
      } => {
        info!(run = %run_id, scope = %scope, processed, failed, total, success, "run completed");
      }
      NotificationEvent::Failed { run_id, scope, reason } => {
        info!(run = %run_id, scope = %scope, reason = %reason, "run failed");
      }
    }
  }
}

/// Capturing sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
  events: Mutex<Vec<NotificationEvent>>,
}

impl MemorySink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn events(&self) -> Vec<NotificationEvent> {
    self.events.lock().map(|e| e.clone()).unwrap_or_default()
  }

  pub fn completed_events(&self) -> Vec<NotificationEvent> {
    self
      .events()
      .into_iter()
      .filter(|e| matches!(e, NotificationEvent::Completed { .. }))
      .collect()
  }
}

#[async_trait]
impl NotificationSink for MemorySink {
  async fn publish(&self, event: NotificationEvent) {
    if let Ok(mut events) = self.events.lock() {
      events.push(event);
    }
  }
}
