//! Adaptive discovery scheduler.
//!
//! Each registered job is a deadline entry in a table the run loop scans:
//! when a job fires and reports work found, its period halves (clamped to
//! the configured floor) to chase the backlog; when it comes back idle the
//! period doubles (clamped to the ceiling). On startup every job runs once
//! immediately so a restarted daemon catches up without waiting out a full
//! interval. Jobs can also rewrite their own next-fire interval through
//! [`SchedulerHandle::set_period`] without waiting for the next tick.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use inlet_core::SchedulerConfig;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A discovery job: runs one cycle, returns whether it found work.
pub type DiscoveryJob = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

#[derive(Debug)]
enum SchedulerCommand {
  SetPeriod { name: String, period: Duration },
}

/// Lets a job (or anything else) rewrite a job's next-fire interval.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
  tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
  /// Set a job's period (clamped to the configured bounds) and reschedule
  /// its next fire accordingly. Unknown names are ignored.
  pub async fn set_period(&self, name: impl Into<String>, period: Duration) {
    let _ = self
      .tx
      .send(SchedulerCommand::SetPeriod {
        name: name.into(),
        period,
      })
      .await;
  }
}

struct JobEntry {
  name: String,
  period: Duration,
  next_fire: Instant,
  job: DiscoveryJob,
}

/// Deadline-table scheduler for discovery cycles.
pub struct Scheduler {
  config: SchedulerConfig,
  jobs: Vec<JobEntry>,
  tx: mpsc::Sender<SchedulerCommand>,
  rx: mpsc::Receiver<SchedulerCommand>,
  cancel: CancellationToken,
}

impl Scheduler {
  pub fn new(config: SchedulerConfig, cancel: CancellationToken) -> Self {
    let (tx, rx) = mpsc::channel(16);
    Self {
      config,
      jobs: Vec::new(),
      tx,
      rx,
      cancel,
    }
  }

  pub fn handle(&self) -> SchedulerHandle {
    SchedulerHandle { tx: self.tx.clone() }
  }

  /// Register a job at the configured initial interval.
  pub fn register(&mut self, name: impl Into<String>, job: DiscoveryJob) {
    let period = Duration::from_secs(self.config.initial_interval_secs);
    self.jobs.push(JobEntry {
      name: name.into(),
      period,
      // Overwritten by the cold-start pass before the first scan.
      next_fire: Instant::now() + period,
      job,
    });
  }

  fn clamp(&self, period: Duration) -> Duration {
    period.clamp(
      Duration::from_secs(self.config.min_interval_secs),
      Duration::from_secs(self.config.max_interval_secs),
    )
  }

  /// Run the scheduler until cancelled.
  pub async fn run(mut self) {
    info!(jobs = self.jobs.len(), "scheduler started");

    // Cold-start catch-up: every job fires once right away.
    for i in 0..self.jobs.len() {
      self.fire(i).await;
    }

    loop {
      let next = self.jobs.iter().map(|j| j.next_fire).min();
      // With no jobs registered there is nothing to wake up for.
      let next = next.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!("scheduler shutting down (cancelled)");
          break;
        }

        // recv never yields None: we hold a sender ourselves.
        cmd = self.rx.recv() => {
          if let Some(SchedulerCommand::SetPeriod { name, period }) = cmd {
            let period = self.clamp(period);
            if let Some(job) = self.jobs.iter_mut().find(|j| j.name == name) {
              debug!(job = %name, period_secs = period.as_secs(), "period rewritten");
              job.period = period;
              job.next_fire = Instant::now() + period;
            }
          }
        }

        _ = tokio::time::sleep_until(next) => {
          let now = Instant::now();
          for i in 0..self.jobs.len() {
            if self.jobs[i].next_fire <= now {
              self.fire(i).await;
            }
          }
        }
      }
    }
  }

  /// Run one job cycle and adapt its period to what it found.
  async fn fire(&mut self, index: usize) {
    let job_fn = self.jobs[index].job.clone();
    let found_work = job_fn().await;

    let current = self.jobs[index].period;
    let adapted = if found_work { current / 2 } else { current * 2 };
    let adapted = self.clamp(adapted);

    let job = &mut self.jobs[index];
    if adapted != current {
      debug!(
        job = %job.name,
        found_work,
        from_secs = current.as_secs(),
        to_secs = adapted.as_secs(),
        "interval adapted"
      );
    }
    job.period = adapted;
    job.next_fire = Instant::now() + adapted;
  }
}
