//! Ingestion and reindex orchestration.
//!
//! The moving parts, leaf-first:
//!
//! - [`ConcurrencyCoordinator`] — cluster-wide weighted lease manager; the
//!   only throttle shared across orchestrations.
//! - [`FileProcessor`] — owns one file's journey (copy, extract, embed)
//!   under a durable claim.
//! - [`IngestionOrchestrator`] — one actor per scope; discovers files,
//!   fans out processors under a local semaphore, aggregates progress from
//!   durable counters.
//! - [`ReindexOrchestrator`] / [`ReindexProcessor`] — full vector-index
//!   rebuild for already-ingested documents.
//! - [`Scheduler`] — adaptive-interval discovery trigger.
//! - [`OrchestratorRouter`] — spawns orchestrator actors on demand, keyed
//!   by scope.

mod error;

pub mod coordinator;
pub mod handle;
pub mod message;
pub mod notify;
pub mod orchestrator;
pub mod processor;
pub mod reindex;
pub mod router;
pub mod scheduler;

pub use coordinator::{ConcurrencyCoordinator, CoordinatorError, Lease, LeaseId};
pub use error::{IngestError, Result};
pub use handle::{OrchestratorHandle, SendError};
pub use message::{OrchestratorMessage, StartOutcome};
pub use notify::{LoggingSink, MemorySink, NotificationEvent, NotificationSink};
pub use orchestrator::{IngestionOrchestrator, OrchestratorContext};
pub use processor::{FileProcessor, ProcessOutcome};
pub use reindex::{ReindexOrchestrator, ReindexOutcome, ReindexProcessor, ReindexStatus, ReindexSummary};
pub use router::OrchestratorRouter;
pub use scheduler::{Scheduler, SchedulerHandle};
