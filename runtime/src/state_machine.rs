//! Ticket state machine.
//!
//! Validates staff actions against the transition table and applies them as
//! conditional writes on the [`TicketStore`]. The single-SERVING-per-category
//! rule is enforced by the store; this module maps its conflicts to
//! [`QueueError`] variants.
//!
//! Every operation works on the branch's current operating day: tickets from
//! previous days are not callable.
//!
//! # Auto-advance
//!
//! A ticket called within a category (`call_next` with a category, or a
//! previous auto-advance) is followed, when marked done, by a best-effort call
//! of the oldest WAITING ticket in that category. Tickets called branch-wide
//! (`call_next` without category, `call_specific`) are not followed.

use crate::metrics::TicketMetrics;
use chrono::{DateTime, Utc};
use queue_desk_core::environment::Clock;
use queue_desk_core::{
    BranchCode, BranchConfig, BranchDirectory, DateKey, QueueError, QueueNumber, ScopeKey,
    SequenceStore, ServeScope, ServingPointerUpdate, StoreError, Ticket, TicketQuery, TicketStatus,
    TicketStore, Transition,
};
use serde::Serialize;
use std::sync::Arc;

/// Ticket counts of a branch for today.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatistics {
    /// Waiting to be called
    pub waiting: usize,
    /// Currently at a counter
    pub serving: usize,
    /// Completed
    pub done: usize,
    /// Did not show up
    pub no_show: usize,
    /// All of the above
    pub total: usize,
}

/// What happened after a category-scoped ticket was marked done.
#[derive(Clone, Debug, PartialEq, Eq)]
enum AutoAdvance {
    Advanced(Box<Ticket>),
    NothingWaiting,
    SlotBusy,
    Failed,
}

impl AutoAdvance {
    const fn outcome(&self) -> &'static str {
        match self {
            Self::Advanced(_) => "advanced",
            Self::NothingWaiting => "empty",
            Self::SlotBusy => "busy",
            Self::Failed => "failed",
        }
    }
}

/// Maps a failed conditional write on a looked-up ticket to a domain error.
fn write_error(err: StoreError, to: TicketStatus) -> QueueError {
    match err {
        StoreError::StatusConflict { actual, .. } => {
            QueueError::InvalidTransition { from: actual, to }
        }
        StoreError::ServingSlotTaken { branch, category } => QueueError::AlreadyServing {
            branch: branch.to_string(),
            category,
        },
        StoreError::TicketNotFound(id) => QueueError::TicketNotFound(id.to_string()),
        other => QueueError::Store(other),
    }
}

/// Applies staff actions to tickets.
#[derive(Clone)]
pub struct TicketStateMachine {
    directory: Arc<dyn BranchDirectory>,
    tickets: Arc<dyn TicketStore>,
    sequences: Arc<dyn SequenceStore>,
    clock: Arc<dyn Clock>,
}

impl TicketStateMachine {
    /// Create a state machine over the given directory, stores and clock.
    #[must_use]
    pub fn new(
        directory: Arc<dyn BranchDirectory>,
        tickets: Arc<dyn TicketStore>,
        sequences: Arc<dyn SequenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            tickets,
            sequences,
            clock,
        }
    }

    fn resolve(&self, branch: &str) -> Result<BranchConfig, QueueError> {
        self.directory
            .resolve(branch)
            .ok_or_else(|| QueueError::InvalidBranch(branch.to_string()))
    }

    /// Look up today's ticket `queue_no` in `branch`.
    ///
    /// An unknown branch has no tickets, so it reports `TicketNotFound`.
    async fn find_today(
        &self,
        branch: &str,
        queue_no: &str,
    ) -> Result<(BranchConfig, Ticket, DateTime<Utc>), QueueError> {
        let parsed: QueueNumber = queue_no.parse()?;
        let not_found = || QueueError::TicketNotFound(queue_no.to_string());

        let config = self.directory.resolve(branch).ok_or_else(not_found)?;
        let now = self.clock.now();
        let ticket = self
            .tickets
            .find_by_queue_no(config.code.clone(), config.date_key(now), parsed)
            .await?
            .ok_or_else(not_found)?;
        Ok((config, ticket, now))
    }

    /// Apply a transition and record it.
    async fn apply(&self, ticket: &Ticket, change: Transition) -> Result<Ticket, StoreError> {
        let updated = self.tickets.transition(ticket.id, change).await?;
        TicketMetrics::record_transition(change.from, change.to);
        tracing::info!(
            branch = %updated.branch,
            queue_no = %updated.queue_no,
            ticket_id = %updated.id,
            from = %change.from,
            to = %change.to,
            "Ticket transitioned"
        );
        Ok(updated)
    }

    /// Best-effort pointer maintenance; the primary transition already succeeded.
    async fn update_pointer(&self, scope: ScopeKey, update: ServingPointerUpdate, at: DateTime<Utc>) {
        if let Err(e) = self
            .sequences
            .update_current_serving(scope.clone(), update, at)
            .await
        {
            tracing::warn!(%scope, error = %e, "Failed to update current serving pointer");
        }
    }

    /// Call the oldest WAITING ticket of `branch` (or of one category in it).
    ///
    /// A branch-wide call still keeps one SERVING ticket per category: it
    /// skips waiting tickets whose category is already being served, so a
    /// younger ticket of a free category may be called before them.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidBranch`]: unknown or inactive branch
    /// - [`QueueError::AlreadyServing`]: the category already has a SERVING ticket,
    ///   or on a branch-wide call every waiting ticket's category does
    /// - [`QueueError::NoTicketsInQueue`]: nothing callable is waiting
    /// - [`QueueError::Store`]: infrastructure failure
    #[tracing::instrument(skip(self), name = "call_next")]
    pub async fn call_next(&self, branch: &str, category: Option<&str>) -> Result<Ticket, QueueError> {
        let config = self.resolve(branch)?;
        let now = self.clock.now();
        let date_key = config.date_key(now);

        match category {
            Some(category) => {
                self.call_next_in_category(&config.code, date_key, category, now)
                    .await
            }
            None => self.call_next_in_branch(&config, date_key, now).await,
        }
    }

    async fn call_next_in_category(
        &self,
        branch: &BranchCode,
        date_key: DateKey,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<Ticket, QueueError> {
        let already_serving = || QueueError::AlreadyServing {
            branch: branch.to_string(),
            category: category.to_string(),
        };

        let in_category = TicketQuery::new(branch.clone(), date_key).in_category(category);
        let serving = self
            .tickets
            .list(in_category.clone().with_statuses(&[TicketStatus::Serving]))
            .await?;
        if !serving.is_empty() {
            return Err(already_serving());
        }

        let waiting = self
            .tickets
            .list(in_category.with_statuses(&[TicketStatus::Waiting]))
            .await?;

        let change = Transition::to_serving(TicketStatus::Waiting, ServeScope::Category, now);
        for candidate in &waiting {
            match self.apply(candidate, change).await {
                Ok(ticket) => return Ok(ticket),
                Err(StoreError::StatusConflict { .. }) => {
                    tracing::debug!(queue_no = %candidate.queue_no, "Candidate taken concurrently, trying next");
                }
                Err(StoreError::ServingSlotTaken { .. }) => return Err(already_serving()),
                Err(e) => return Err(e.into()),
            }
        }
        Err(QueueError::NoTicketsInQueue)
    }

    async fn call_next_in_branch(
        &self,
        config: &BranchConfig,
        date_key: DateKey,
        now: DateTime<Utc>,
    ) -> Result<Ticket, QueueError> {
        let waiting = self
            .tickets
            .list(TicketQuery::new(config.code.clone(), date_key).with_statuses(&[TicketStatus::Waiting]))
            .await?;

        let change = Transition::to_serving(TicketStatus::Waiting, ServeScope::Branch, now);
        let mut busy_category: Option<String> = None;
        for candidate in &waiting {
            match self.apply(candidate, change).await {
                Ok(ticket) => {
                    self.update_pointer(
                        ScopeKey::new(config.code.clone(), date_key),
                        ServingPointerUpdate::Set(ticket.queue_no.clone()),
                        now,
                    )
                    .await;
                    return Ok(ticket);
                }
                Err(StoreError::StatusConflict { .. }) => {
                    tracing::debug!(queue_no = %candidate.queue_no, "Candidate taken concurrently, trying next");
                }
                Err(StoreError::ServingSlotTaken { category, .. }) => {
                    tracing::debug!(queue_no = %candidate.queue_no, %category, "Category busy, trying next");
                    busy_category.get_or_insert(category);
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Tickets are still waiting, but only behind busy categories.
        match busy_category {
            Some(category) => Err(QueueError::AlreadyServing {
                branch: config.code.to_string(),
                category,
            }),
            None => Err(QueueError::NoTicketsInQueue),
        }
    }

    /// Call a specific ticket, completing whatever else the branch is serving.
    ///
    /// Every other SERVING ticket of the branch is moved to DONE first, then
    /// the target is moved to SERVING. A reader between the two steps may see
    /// no SERVING ticket at all.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidQueueNumber`]: `queue_no` is malformed
    /// - [`QueueError::TicketNotFound`]: no such ticket today
    /// - [`QueueError::InvalidTransition`]: the ticket is not WAITING
    /// - [`QueueError::AlreadyServing`]: another ticket took the category slot concurrently
    /// - [`QueueError::Store`]: infrastructure failure
    #[tracing::instrument(skip(self), name = "call_specific")]
    pub async fn call_specific(&self, branch: &str, queue_no: &str) -> Result<Ticket, QueueError> {
        let (config, target, now) = self.find_today(branch, queue_no).await?;
        target.status.check_transition(TicketStatus::Serving)?;

        let serving = self
            .tickets
            .list(
                TicketQuery::new(config.code.clone(), target.date_key)
                    .with_statuses(&[TicketStatus::Serving]),
            )
            .await?;

        let complete = Transition::new(TicketStatus::Serving, TicketStatus::Done, now);
        for other in serving.iter().filter(|t| t.id != target.id) {
            match self.apply(other, complete).await {
                Ok(_) => {}
                Err(StoreError::StatusConflict { .. }) => {
                    tracing::debug!(queue_no = %other.queue_no, "Serving ticket already moved on");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let call = Transition::to_serving(target.status, ServeScope::Branch, now);
        let ticket = self
            .apply(&target, call)
            .await
            .map_err(|e| write_error(e, TicketStatus::Serving))?;

        self.update_pointer(
            ScopeKey::new(config.code, ticket.date_key),
            ServingPointerUpdate::Set(ticket.queue_no.clone()),
            now,
        )
        .await;

        Ok(ticket)
    }

    /// Mark a SERVING ticket done.
    ///
    /// Clears the display pointer if it names this ticket. Tickets called
    /// within a category are followed by a best-effort call of the next
    /// WAITING ticket of that category; its failures are logged, not returned.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidQueueNumber`]: `queue_no` is malformed
    /// - [`QueueError::TicketNotFound`]: no such ticket today
    /// - [`QueueError::InvalidTransition`]: the ticket is not SERVING
    /// - [`QueueError::Store`]: infrastructure failure
    #[tracing::instrument(skip(self), name = "mark_done")]
    pub async fn mark_done(&self, branch: &str, queue_no: &str) -> Result<Ticket, QueueError> {
        let (config, ticket, now) = self.find_today(branch, queue_no).await?;
        ticket.status.check_transition(TicketStatus::Done)?;

        let done = self
            .apply(&ticket, Transition::new(ticket.status, TicketStatus::Done, now))
            .await
            .map_err(|e| write_error(e, TicketStatus::Done))?;

        self.update_pointer(
            ScopeKey::new(config.code.clone(), done.date_key),
            ServingPointerUpdate::ClearIfCurrent(done.queue_no.clone()),
            now,
        )
        .await;

        if done.serve_scope == Some(ServeScope::Category) {
            let outcome = self
                .auto_advance(&config.code, done.date_key, &done.category, now)
                .await;
            TicketMetrics::record_auto_advance(outcome.outcome());
            if let AutoAdvance::Advanced(next) = &outcome {
                tracing::info!(
                    branch = %config.code,
                    category = %done.category,
                    queue_no = %next.queue_no,
                    "Auto-advanced next ticket"
                );
            }
        }

        Ok(done)
    }

    async fn auto_advance(
        &self,
        branch: &BranchCode,
        date_key: DateKey,
        category: &str,
        now: DateTime<Utc>,
    ) -> AutoAdvance {
        match self.call_next_in_category(branch, date_key, category, now).await {
            Ok(ticket) => AutoAdvance::Advanced(Box::new(ticket)),
            Err(QueueError::NoTicketsInQueue) => {
                tracing::debug!(%branch, category, "No ticket waiting to auto-advance");
                AutoAdvance::NothingWaiting
            }
            Err(QueueError::AlreadyServing { .. }) => {
                tracing::debug!(%branch, category, "Category already serving, skipping auto-advance");
                AutoAdvance::SlotBusy
            }
            Err(e) => {
                tracing::warn!(%branch, category, error = %e, "Auto-advance failed");
                AutoAdvance::Failed
            }
        }
    }

    /// Mark a WAITING or SERVING ticket as a no-show.
    ///
    /// If it was SERVING, the display pointer is cleared when it names this ticket.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidQueueNumber`]: `queue_no` is malformed
    /// - [`QueueError::TicketNotFound`]: no such ticket today
    /// - [`QueueError::InvalidTransition`]: the ticket is DONE or NOSHOW
    /// - [`QueueError::Store`]: infrastructure failure
    #[tracing::instrument(skip(self), name = "mark_no_show")]
    pub async fn mark_no_show(&self, branch: &str, queue_no: &str) -> Result<Ticket, QueueError> {
        let (config, ticket, now) = self.find_today(branch, queue_no).await?;
        ticket.status.check_transition(TicketStatus::NoShow)?;

        let was_serving = ticket.status == TicketStatus::Serving;
        let no_show = self
            .apply(&ticket, Transition::new(ticket.status, TicketStatus::NoShow, now))
            .await
            .map_err(|e| write_error(e, TicketStatus::NoShow))?;

        if was_serving {
            self.update_pointer(
                ScopeKey::new(config.code, no_show.date_key),
                ServingPointerUpdate::ClearIfCurrent(no_show.queue_no.clone()),
                now,
            )
            .await;
        }

        Ok(no_show)
    }

    /// The oldest SERVING ticket of `branch` today, if any.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidBranch`]: unknown or inactive branch
    /// - [`QueueError::Store`]: infrastructure failure
    pub async fn current_serving_ticket(&self, branch: &str) -> Result<Option<Ticket>, QueueError> {
        let config = self.resolve(branch)?;
        let query = TicketQuery::new(config.code.clone(), config.date_key(self.clock.now()))
            .with_statuses(&[TicketStatus::Serving]);
        Ok(self.tickets.list(query).await?.into_iter().next())
    }

    /// Ticket counts of `branch` for today.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidBranch`]: unknown or inactive branch
    /// - [`QueueError::Store`]: infrastructure failure
    pub async fn queue_statistics(&self, branch: &str) -> Result<QueueStatistics, QueueError> {
        let config = self.resolve(branch)?;
        let query = TicketQuery::new(config.code.clone(), config.date_key(self.clock.now()));
        let tickets = self.tickets.list(query).await?;

        let mut stats = QueueStatistics::default();
        for ticket in &tickets {
            match ticket.status {
                TicketStatus::Waiting => stats.waiting += 1,
                TicketStatus::Serving => stats.serving += 1,
                TicketStatus::Done => stats.done += 1,
                TicketStatus::NoShow => stats.no_show += 1,
            }
        }
        stats.total = tickets.len();
        Ok(stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use queue_desk_testing::{
        InMemorySequenceStore, InMemoryTicketStore, TicketFixture, default_directory, test_clock,
    };

    struct Harness {
        machine: TicketStateMachine,
        tickets: InMemoryTicketStore,
        sequences: InMemorySequenceStore,
    }

    fn harness() -> Harness {
        let tickets = InMemoryTicketStore::new();
        let sequences = InMemorySequenceStore::new();
        let machine = TicketStateMachine::new(
            Arc::new(default_directory()),
            Arc::new(tickets.clone()),
            Arc::new(sequences.clone()),
            Arc::new(test_clock()),
        );
        Harness {
            machine,
            tickets,
            sequences,
        }
    }

    #[test]
    fn write_errors_map_to_domain_errors() {
        let conflict = StoreError::StatusConflict {
            ticket_id: queue_desk_core::TicketId::new(),
            expected: TicketStatus::Serving,
            actual: TicketStatus::Done,
        };
        assert_eq!(
            write_error(conflict, TicketStatus::Done),
            QueueError::InvalidTransition {
                from: TicketStatus::Done,
                to: TicketStatus::Done
            }
        );

        let db = StoreError::DatabaseError("down".to_string());
        assert!(write_error(db, TicketStatus::Done).is_infrastructure());
    }

    #[tokio::test]
    async fn unknown_branch_reports_ticket_not_found_for_staff_actions() {
        let h = harness();
        let err = h.machine.mark_done("WEST", "A-001").await.unwrap_err();
        assert_eq!(err, QueueError::TicketNotFound("A-001".to_string()));

        let err = h.machine.call_next("WEST", None).await.unwrap_err();
        assert_eq!(err, QueueError::InvalidBranch("WEST".to_string()));
    }

    #[tokio::test]
    async fn malformed_queue_number_is_rejected() {
        let h = harness();
        let err = h.machine.call_specific("MAIN", "A-1").await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidQueueNumber(_)));
    }

    #[tokio::test]
    async fn pointer_failures_do_not_fail_the_call() {
        let h = harness();
        h.tickets.insert(TicketFixture::new("MAIN", "A-001").build()).await.unwrap();
        h.sequences.fail_pointer_updates(true);

        let ticket = h.machine.call_next("MAIN", None).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Serving);
    }

    #[tokio::test]
    async fn statistics_count_todays_tickets() {
        let h = harness();
        for n in ["A-001", "A-002", "A-003"] {
            h.tickets.insert(TicketFixture::new("MAIN", n).build()).await.unwrap();
        }
        h.tickets
            .insert(TicketFixture::new("MAIN", "A-009").date_key("2024-12-31").build())
            .await
            .unwrap();

        h.machine.call_next("MAIN", None).await.unwrap();
        h.machine.mark_done("MAIN", "A-001").await.unwrap();
        h.machine.mark_no_show("MAIN", "A-002").await.unwrap();

        let stats = h.machine.queue_statistics("MAIN").await.unwrap();
        assert_eq!(
            stats,
            QueueStatistics {
                waiting: 1,
                serving: 0,
                done: 1,
                no_show: 1,
                total: 3,
            }
        );
    }

    #[tokio::test]
    async fn yesterdays_tickets_are_not_callable() {
        let h = harness();
        h.tickets
            .insert(TicketFixture::new("MAIN", "A-001").date_key("2024-12-31").build())
            .await
            .unwrap();

        assert_eq!(
            h.machine.call_next("MAIN", None).await.unwrap_err(),
            QueueError::NoTicketsInQueue
        );
        assert_eq!(
            h.machine.call_specific("MAIN", "A-001").await.unwrap_err(),
            QueueError::TicketNotFound("A-001".to_string())
        );
    }
}
