//! The queue desk facade.
//!
//! [`QueueDesk`] is what an outer layer (HTTP handlers, a kiosk, a staff
//! console) talks to. It owns the allocator and the state machine and adds
//! customer registration on top of them.

use queue_desk_core::environment::Clock;
use queue_desk_core::{
    BranchConfig, BranchDirectory, NewTicket, Purpose, QueueError, QueueNumber, SequenceRecord,
    SequenceStore, Ticket, TicketId, TicketStore,
};
use queue_desk_runtime::{
    Allocation, QueueAllocator, QueueState, QueueStatistics, QueueStats, TicketStateMachine,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A customer's registration details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Customer name
    pub full_name: String,
    /// Contact number
    pub mobile: String,
    /// Vehicle or service category the customer queues for
    pub category: String,
    /// Why the customer came in
    #[serde(default)]
    pub purpose: Purpose,
}

impl Registration {
    /// Registration with the default purpose.
    #[must_use]
    pub fn new(
        full_name: impl Into<String>,
        mobile: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            mobile: mobile.into(),
            category: category.into(),
            purpose: Purpose::default(),
        }
    }

    /// Set the purpose.
    #[must_use]
    pub fn with_purpose(mut self, purpose: Purpose) -> Self {
        self.purpose = purpose;
        self
    }

    /// Trimmed copy, rejecting a blank name or category.
    fn normalized(&self) -> Result<Self, QueueError> {
        let full_name = self.full_name.trim();
        let category = self.category.trim();
        if full_name.is_empty() {
            return Err(QueueError::InvalidRegistration("full name is required".to_string()));
        }
        if category.is_empty() {
            return Err(QueueError::InvalidRegistration("category is required".to_string()));
        }
        Ok(Self {
            full_name: full_name.to_string(),
            mobile: self.mobile.trim().to_string(),
            category: category.to_string(),
            purpose: self.purpose,
        })
    }

    fn into_ticket(self, allocation: Allocation) -> NewTicket {
        NewTicket {
            id: TicketId::new(),
            queue_no: allocation.queue_no,
            branch: allocation.branch.code,
            date_key: allocation.scope.date_key,
            category: self.category,
            full_name: self.full_name,
            mobile: self.mobile,
            purpose: self.purpose,
            created_at: allocation.issued_at,
        }
    }
}

/// Queue desk: allocation, registration and staff actions for every branch.
///
/// Cloning is cheap; clones share the stores.
#[derive(Clone)]
pub struct QueueDesk {
    directory: Arc<dyn BranchDirectory>,
    tickets: Arc<dyn TicketStore>,
    allocator: QueueAllocator,
    machine: TicketStateMachine,
}

impl QueueDesk {
    /// Wire a desk over the given directory, stores and clock.
    #[must_use]
    pub fn new(
        directory: Arc<dyn BranchDirectory>,
        tickets: Arc<dyn TicketStore>,
        sequences: Arc<dyn SequenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let allocator = QueueAllocator::new(directory.clone(), sequences.clone(), clock.clone());
        let machine = TicketStateMachine::new(directory.clone(), tickets.clone(), sequences, clock);
        Self {
            directory,
            tickets,
            allocator,
            machine,
        }
    }

    /// The underlying allocator.
    #[must_use]
    pub const fn allocator(&self) -> &QueueAllocator {
        &self.allocator
    }

    /// The underlying state machine.
    #[must_use]
    pub const fn state_machine(&self) -> &TicketStateMachine {
        &self.machine
    }

    /// Active branches.
    #[must_use]
    pub fn branches(&self) -> Vec<BranchConfig> {
        self.directory.list_active()
    }

    /// Mint the next queue number for `branch` today.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidBranch`]: unknown or inactive branch
    /// - [`QueueError::QueueFull`]: the daily cap is exhausted
    /// - [`QueueError::Store`]: infrastructure failure
    pub async fn allocate_queue_number(&self, branch: &str) -> Result<QueueNumber, QueueError> {
        self.allocator.allocate(branch).await
    }

    /// Register a customer: validate, allocate a number and store a WAITING ticket.
    ///
    /// Validation happens before allocation, so a rejected registration
    /// consumes no number.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidRegistration`]: blank name or category
    /// - [`QueueError::InvalidBranch`]: unknown or inactive branch
    /// - [`QueueError::QueueFull`]: the daily cap is exhausted
    /// - [`QueueError::Store`]: infrastructure failure
    #[tracing::instrument(skip(self, registration), name = "register")]
    pub async fn register(&self, branch: &str, registration: &Registration) -> Result<Ticket, QueueError> {
        let registration = registration.normalized()?;
        let allocation = self.allocator.allocate_in_scope(branch).await?;

        let ticket = self.tickets.insert(registration.into_ticket(allocation)).await?;

        tracing::info!(
            branch = %ticket.branch,
            queue_no = %ticket.queue_no,
            ticket_id = %ticket.id,
            category = %ticket.category,
            "Customer registered"
        );
        Ok(ticket)
    }

    /// Call the oldest WAITING ticket of `branch`, or of one category in it.
    ///
    /// A blank `category` means the whole branch. A branch-wide call passes
    /// over tickets whose category is already being served.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidBranch`]: unknown or inactive branch
    /// - [`QueueError::AlreadyServing`]: the category already has a SERVING ticket,
    ///   or every waiting ticket sits behind a busy category
    /// - [`QueueError::NoTicketsInQueue`]: nothing callable is waiting
    /// - [`QueueError::Store`]: infrastructure failure
    pub async fn call_next_ticket(&self, branch: &str, category: Option<&str>) -> Result<Ticket, QueueError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        self.machine.call_next(branch, category).await
    }

    /// Call a specific WAITING ticket, completing whatever the branch is serving.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidQueueNumber`]: malformed `queue_no`
    /// - [`QueueError::TicketNotFound`]: no such ticket today
    /// - [`QueueError::InvalidTransition`]: the ticket is not WAITING
    /// - [`QueueError::AlreadyServing`]: another desk took the category slot first
    /// - [`QueueError::Store`]: infrastructure failure
    pub async fn call_specific_ticket(&self, branch: &str, queue_no: &str) -> Result<Ticket, QueueError> {
        self.machine.call_specific(branch, queue_no).await
    }

    /// Complete a SERVING ticket.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidQueueNumber`]: malformed `queue_no`
    /// - [`QueueError::TicketNotFound`]: no such ticket today
    /// - [`QueueError::InvalidTransition`]: the ticket is not SERVING
    /// - [`QueueError::Store`]: infrastructure failure
    pub async fn mark_ticket_done(&self, branch: &str, queue_no: &str) -> Result<Ticket, QueueError> {
        self.machine.mark_done(branch, queue_no).await
    }

    /// Mark a WAITING or SERVING ticket as a no-show.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidQueueNumber`]: malformed `queue_no`
    /// - [`QueueError::TicketNotFound`]: no such ticket today
    /// - [`QueueError::InvalidTransition`]: the ticket is already terminal
    /// - [`QueueError::Store`]: infrastructure failure
    pub async fn mark_ticket_no_show(&self, branch: &str, queue_no: &str) -> Result<Ticket, QueueError> {
        self.machine.mark_no_show(branch, queue_no).await
    }

    /// Today's counter state of `branch`.
    ///
    /// # Errors
    ///
    /// See [`QueueAllocator::queue_state`].
    pub async fn queue_state(&self, branch: &str) -> Result<QueueState, QueueError> {
        self.allocator.queue_state(branch).await
    }

    /// Today's capacity figures of `branch`.
    ///
    /// # Errors
    ///
    /// See [`QueueAllocator::queue_stats`].
    pub async fn queue_stats(&self, branch: &str) -> Result<QueueStats, QueueError> {
        self.allocator.queue_stats(branch).await
    }

    /// Today's ticket counts of `branch`.
    ///
    /// # Errors
    ///
    /// See [`TicketStateMachine::queue_statistics`].
    pub async fn queue_statistics(&self, branch: &str) -> Result<QueueStatistics, QueueError> {
        self.machine.queue_statistics(branch).await
    }

    /// The ticket `branch` is serving, if any.
    ///
    /// # Errors
    ///
    /// See [`TicketStateMachine::current_serving_ticket`].
    pub async fn current_serving_ticket(&self, branch: &str) -> Result<Option<Ticket>, QueueError> {
        self.machine.current_serving_ticket(branch).await
    }

    /// Reset today's counter of `branch`. Administrative.
    ///
    /// # Errors
    ///
    /// See [`QueueAllocator::reset_queue`].
    pub async fn reset_queue(&self, branch: &str) -> Result<SequenceRecord, QueueError> {
        self.allocator.reset_queue(branch).await
    }
}
