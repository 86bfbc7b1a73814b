//! Queue-number allocator.
//!
//! Mints `{prefix}-{NNN}` numbers from the per-`(branch, day)` counter. The
//! counter increment is a single atomic store call, so concurrent callers
//! never receive the same number and no lock is held here.
//!
//! Allocation is at-least-once: the increment happens before the cap check
//! and before the caller persists a ticket, so a rejected or abandoned
//! allocation leaks its value. Numbers are unique, not gap-free.

use crate::metrics::QueueMetrics;
use chrono::{DateTime, Utc};
use queue_desk_core::environment::Clock;
use queue_desk_core::queue_number::MAX_SEQUENCE;
use queue_desk_core::{
    BranchCode, BranchConfig, BranchDirectory, DateKey, QueueError, QueueNumber, ScopeKey,
    SequenceRecord, SequenceStore,
};
use serde::Serialize;
use std::sync::Arc;

/// A freshly allocated number together with where and when it was issued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    /// The allocated number
    pub queue_no: QueueNumber,
    /// Branch it was issued for
    pub branch: BranchConfig,
    /// Scope the counter was incremented in
    pub scope: ScopeKey,
    /// Allocation instant
    pub issued_at: DateTime<Utc>,
}

/// Today's counter state for a branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueueState {
    /// Branch code
    pub branch: BranchCode,
    /// Operating day
    pub date_key: DateKey,
    /// Highest value issued so far
    pub last_number: u32,
    /// Queue number on the "now serving" display
    pub current_serving: Option<QueueNumber>,
    /// Number the next allocation would receive, if the cap allows one
    pub next_queue_no: Option<QueueNumber>,
}

/// Today's capacity figures for a branch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueueStats {
    /// Branch code
    pub branch: BranchCode,
    /// Operating day
    pub date_key: DateKey,
    /// Numbers issued within the cap
    pub total_generated: u32,
    /// Daily cap
    pub max_allowed: u32,
    /// Numbers still available today
    pub remaining: u32,
    /// Queue number on the "now serving" display
    pub current_serving: Option<QueueNumber>,
    /// `total_generated / max_allowed` as a percentage, two decimals
    pub percentage_full: f64,
}

/// Allocates queue numbers and exposes the per-branch counter state.
#[derive(Clone)]
pub struct QueueAllocator {
    directory: Arc<dyn BranchDirectory>,
    sequences: Arc<dyn SequenceStore>,
    clock: Arc<dyn Clock>,
}

impl QueueAllocator {
    /// Create an allocator over the given directory, store and clock.
    #[must_use]
    pub fn new(
        directory: Arc<dyn BranchDirectory>,
        sequences: Arc<dyn SequenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            sequences,
            clock,
        }
    }

    /// Effective cap: the configured cap, bounded by what three digits can hold.
    fn cap(&self) -> u32 {
        self.directory.daily_cap().min(MAX_SEQUENCE)
    }

    fn resolve(&self, branch: &str) -> Result<BranchConfig, QueueError> {
        self.directory
            .resolve(branch)
            .ok_or_else(|| QueueError::InvalidBranch(branch.to_string()))
    }

    /// Allocate the next queue number for `branch`.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidBranch`]: unknown or inactive branch (no mutation)
    /// - [`QueueError::QueueFull`]: the daily cap is exhausted (counter already incremented)
    /// - [`QueueError::Store`]: the counter could not be incremented
    pub async fn allocate(&self, branch: &str) -> Result<QueueNumber, QueueError> {
        Ok(self.allocate_in_scope(branch).await?.queue_no)
    }

    /// Allocate and also return the branch and scope the number belongs to.
    ///
    /// Registration needs the scope to persist the ticket under the same
    /// operating day the number was issued for.
    ///
    /// # Errors
    ///
    /// Same as [`allocate`](Self::allocate).
    #[tracing::instrument(skip(self), name = "allocate_queue_number")]
    pub async fn allocate_in_scope(&self, branch: &str) -> Result<Allocation, QueueError> {
        let config = self.resolve(branch)?;
        let now = self.clock.now();
        let scope = config.scope(now);

        let value = self.sequences.next_number(scope.clone(), now).await?;

        let cap = self.cap();
        if value > cap {
            QueueMetrics::record_queue_full(config.code.as_str());
            tracing::warn!(branch = %config.code, value, cap, "Daily queue cap reached");
            return Err(QueueError::QueueFull {
                branch: config.code.to_string(),
                cap,
            });
        }

        let queue_no = QueueNumber::new(config.prefix.clone(), value)?;
        QueueMetrics::record_allocated(config.code.as_str());
        tracing::info!(branch = %config.code, %queue_no, date_key = %scope.date_key, "Allocated queue number");

        Ok(Allocation {
            queue_no,
            branch: config,
            scope,
            issued_at: now,
        })
    }

    async fn today(&self, branch: &str) -> Result<(BranchConfig, SequenceRecord), QueueError> {
        let config = self.resolve(branch)?;
        let now = self.clock.now();
        let scope = config.scope(now);
        let record = self
            .sequences
            .load(scope.clone())
            .await?
            .unwrap_or_else(|| SequenceRecord::fresh(scope, now));
        Ok((config, record))
    }

    /// Counter state of `branch` for today.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidBranch`]: unknown or inactive branch
    /// - [`QueueError::Store`]: the record could not be loaded
    pub async fn queue_state(&self, branch: &str) -> Result<QueueState, QueueError> {
        let (config, record) = self.today(branch).await?;
        let next = record.last_number.saturating_add(1);
        let next_queue_no = if next <= self.cap() {
            QueueNumber::new(config.prefix, next).ok()
        } else {
            None
        };

        Ok(QueueState {
            branch: config.code,
            date_key: record.scope.date_key,
            last_number: record.last_number,
            current_serving: record.current_serving,
            next_queue_no,
        })
    }

    /// Capacity figures of `branch` for today.
    ///
    /// Values leaked past the cap by rejected allocations are not counted.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidBranch`]: unknown or inactive branch
    /// - [`QueueError::Store`]: the record could not be loaded
    pub async fn queue_stats(&self, branch: &str) -> Result<QueueStats, QueueError> {
        let (config, record) = self.today(branch).await?;
        let cap = self.cap();
        let issued = record.last_number.min(cap);
        let percentage_full = if cap == 0 {
            100.0
        } else {
            (f64::from(issued) / f64::from(cap) * 10_000.0).round() / 100.0
        };

        Ok(QueueStats {
            branch: config.code,
            date_key: record.scope.date_key,
            total_generated: issued,
            max_allowed: cap,
            remaining: cap - issued,
            current_serving: record.current_serving,
            percentage_full,
        })
    }

    /// Queue number on the "now serving" display of `branch`.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidBranch`]: unknown or inactive branch
    /// - [`QueueError::Store`]: the record could not be loaded
    pub async fn current_serving(&self, branch: &str) -> Result<Option<QueueNumber>, QueueError> {
        Ok(self.today(branch).await?.1.current_serving)
    }

    /// Reset today's counter of `branch` and clear its pointer.
    ///
    /// Administrative: numbers restart at `001`, so it must only be used on a
    /// day without persisted tickets.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidBranch`]: unknown or inactive branch
    /// - [`QueueError::Store`]: the record could not be written
    pub async fn reset_queue(&self, branch: &str) -> Result<SequenceRecord, QueueError> {
        let config = self.resolve(branch)?;
        let now = self.clock.now();
        let record = self.sequences.reset(config.scope(now), now).await?;
        tracing::warn!(branch = %config.code, date_key = %record.scope.date_key, "Queue counter reset");
        Ok(record)
    }
}
