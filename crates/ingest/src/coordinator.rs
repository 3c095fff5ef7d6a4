//! Cluster-wide weighted lease manager.
//!
//! Admission control across every orchestration instance: no more than a
//! category's capacity in lease weight is ever outstanding, regardless of
//! how many orchestrators are fanning out at once. Leases carry a TTL so a
//! crashed holder frees its capacity without an explicit release.
//!
//! Waiters queue first-come-first-served: a waiter is only granted when its
//! ticket is at the front of the queue, so a small request cannot starve a
//! large one that arrived earlier.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};
use uuid::Uuid;

use inlet_core::CoordinatorConfig;

/// How often a suspended waiter re-checks for capacity.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Capacity for categories the config does not name.
const DEFAULT_CAPACITY: u32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
  /// Retryable: capacity did not free up within the wait timeout.
  #[error("timed out waiting for capacity in category {category}")]
  Timeout { category: String },

  /// A request that can never be satisfied at the configured capacity.
  #[error("lease weight {weight} exceeds capacity {capacity} of category {category}")]
  WeightExceedsCapacity {
    category: String,
    weight: u32,
    capacity: u32,
  },
}

/// Identifier of one granted lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(Uuid);

impl LeaseId {
  fn new() -> Self {
    Self(Uuid::new_v4())
  }
}

impl std::fmt::Display for LeaseId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

/// A granted capacity token. Advisory-durable: once `expires_at` passes the
/// coordinator treats it as released whether or not the holder calls
/// [`ConcurrencyCoordinator::release`].
#[derive(Debug, Clone)]
pub struct Lease {
  pub id: LeaseId,
  pub category: String,
  pub weight: u32,
  pub expires_at: Instant,
}

#[derive(Debug)]
struct LeaseEntry {
  requester: String,
  weight: u32,
  expires_at: Instant,
}

#[derive(Debug, Default)]
struct CategoryState {
  leases: HashMap<LeaseId, LeaseEntry>,
  waiters: VecDeque<u64>,
}

impl CategoryState {
  fn prune_expired(&mut self, now: Instant) {
    self.leases.retain(|_, entry| entry.expires_at > now);
  }

  fn used_weight(&self) -> u32 {
    self.leases.values().map(|e| e.weight).sum()
  }
}

#[derive(Debug, Default)]
struct Inner {
  categories: HashMap<String, CategoryState>,
  next_ticket: u64,
}

/// Weighted lease manager, one instance shared by every orchestrator.
#[derive(Debug)]
pub struct ConcurrencyCoordinator {
  capacities: HashMap<String, u32>,
  inner: Mutex<Inner>,
}

impl ConcurrencyCoordinator {
  pub fn new(config: CoordinatorConfig) -> Self {
    Self {
      capacities: config.capacities,
      inner: Mutex::new(Inner::default()),
    }
  }

  fn capacity(&self, category: &str) -> u32 {
    self.capacities.get(category).copied().unwrap_or(DEFAULT_CAPACITY)
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
    // A poisoned lock only means another waiter panicked mid-check; the
    // state itself is a plain map and remains usable.
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Suspend until `weight` units are free in `category`, FIFO among
  /// waiters, or fail with a retryable [`CoordinatorError::Timeout`] after
  /// `wait_timeout`.
  pub async fn acquire(
    &self,
    category: &str,
    requester: &str,
    weight: u32,
    wait_timeout: Duration,
    lease_ttl: Duration,
  ) -> Result<Lease, CoordinatorError> {
    let capacity = self.capacity(category);
    if weight > capacity {
      return Err(CoordinatorError::WeightExceedsCapacity {
        category: category.to_string(),
        weight,
        capacity,
      });
    }

    // Take a queue ticket so later arrivals cannot jump ahead.
    let ticket = {
      let mut inner = self.lock();
      let ticket = inner.next_ticket;
      inner.next_ticket += 1;
      inner.categories.entry(category.to_string()).or_default().waiters.push_back(ticket);
      ticket
    };
    // Deregisters on drop, so a caller abandoning this future mid-wait
    // cannot leave a dead ticket blocking the front of the queue. Once
    // granted the ticket is already popped and the drop is a no-op.
    let _guard = TicketGuard {
      coordinator: self,
      category,
      ticket,
    };

    let deadline = Instant::now() + wait_timeout;
    loop {
      {
        let mut inner = self.lock();
        // Entry exists from ticket registration above.
        if let Some(state) = inner.categories.get_mut(category) {
          let now = Instant::now();
          state.prune_expired(now);
          if state.waiters.front() == Some(&ticket) && state.used_weight() + weight <= capacity {
            state.waiters.pop_front();
            let lease = Lease {
              id: LeaseId::new(),
              category: category.to_string(),
              weight,
              expires_at: now + lease_ttl,
            };
            state.leases.insert(
              lease.id,
              LeaseEntry {
                requester: requester.to_string(),
                weight,
                expires_at: lease.expires_at,
              },
            );
            debug!(category, requester, weight, lease = %lease.id, "lease granted");
            return Ok(lease);
          }
        }
      }

      let now = Instant::now();
      if now >= deadline {
        // The guard removes the ticket on the way out.
        warn!(category, requester, weight, "lease acquisition timed out");
        return Err(CoordinatorError::Timeout {
          category: category.to_string(),
        });
      }

      sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
  }

  /// Idempotent release. Returns whether a live lease was actually removed;
  /// releasing an expired or unknown lease returns false.
  pub fn release(&self, lease_id: LeaseId) -> bool {
    let mut inner = self.lock();
    let now = Instant::now();
    for state in inner.categories.values_mut() {
      state.prune_expired(now);
      if let Some(entry) = state.leases.remove(&lease_id) {
        debug!(lease = %lease_id, requester = %entry.requester, "lease released");
        return true;
      }
    }
    false
  }

  fn deregister_waiter(&self, category: &str, ticket: u64) {
    let mut inner = self.lock();
    if let Some(state) = inner.categories.get_mut(category) {
      state.waiters.retain(|&t| t != ticket);
    }
  }

  /// Currently outstanding (non-expired) weight in a category.
  pub fn outstanding(&self, category: &str) -> u32 {
    let mut inner = self.lock();
    match inner.categories.get_mut(category) {
      Some(state) => {
        state.prune_expired(Instant::now());
        state.used_weight()
      }
      None => 0,
    }
  }
}

/// Removes the owning waiter's queue ticket when dropped. Popped tickets
/// are no longer in the queue, so dropping after a grant does nothing.
struct TicketGuard<'a> {
  coordinator: &'a ConcurrencyCoordinator,
  category: &'a str,
  ticket: u64,
}

impl Drop for TicketGuard<'_> {
  fn drop(&mut self) {
    self.coordinator.deregister_waiter(self.category, self.ticket);
  }
}
