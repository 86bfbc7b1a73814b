//! Shared harness for runtime integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use queue_desk_core::{
    BranchDirectory, NewTicket, Purpose, SequenceStore, Ticket, TicketId, TicketStatus,
};
use queue_desk_runtime::{QueueAllocator, TicketStateMachine};
use queue_desk_testing::{
    FixedClock, InMemorySequenceStore, InMemoryTicketStore, default_directory, test_clock,
};
use std::sync::Arc;

/// Allocator and state machine wired to shared in-memory stores.
#[derive(Clone)]
pub struct Desk {
    pub allocator: QueueAllocator,
    pub machine: TicketStateMachine,
    pub tickets: InMemoryTicketStore,
    pub sequences: InMemorySequenceStore,
    pub clock: FixedClock,
}

impl Desk {
    pub fn new() -> Self {
        Self::with_directory(default_directory())
    }

    pub fn with_directory(directory: impl BranchDirectory + 'static) -> Self {
        let directory: Arc<dyn BranchDirectory> = Arc::new(directory);
        let tickets = InMemoryTicketStore::new();
        let sequences = InMemorySequenceStore::new();
        let clock = test_clock();

        let allocator = QueueAllocator::new(
            directory.clone(),
            Arc::new(sequences.clone()),
            Arc::new(clock.clone()),
        );
        let machine = TicketStateMachine::new(
            directory,
            Arc::new(tickets.clone()),
            Arc::new(sequences.clone()),
            Arc::new(clock.clone()),
        );

        Self {
            allocator,
            machine,
            tickets,
            sequences,
            clock,
        }
    }

    /// Allocate a number and persist a WAITING ticket for it.
    pub async fn register(&self, branch: &str, category: &str) -> Ticket {
        use queue_desk_core::TicketStore;

        let allocation = self.allocator.allocate_in_scope(branch).await.unwrap();
        self.tickets
            .insert(NewTicket {
                id: TicketId::new(),
                queue_no: allocation.queue_no,
                branch: allocation.branch.code,
                date_key: allocation.scope.date_key,
                category: category.to_string(),
                full_name: "Test Customer".to_string(),
                mobile: "0800000000".to_string(),
                purpose: Purpose::TestDrive,
                created_at: allocation.issued_at,
            })
            .await
            .unwrap()
    }

    /// Current stored status of a ticket by queue number.
    pub fn status_of(&self, queue_no: &str) -> TicketStatus {
        self.ticket(queue_no).status
    }

    pub fn ticket(&self, queue_no: &str) -> Ticket {
        self.tickets
            .snapshot()
            .into_iter()
            .find(|t| t.queue_no.to_string() == queue_no)
            .expect("ticket exists")
    }

    /// Number of SERVING tickets in a category.
    pub fn serving_in(&self, category: &str) -> usize {
        self.tickets
            .snapshot()
            .iter()
            .filter(|t| t.status == TicketStatus::Serving && t.category == category)
            .count()
    }

    /// "Now serving" pointer of MAIN today.
    pub async fn pointer(&self) -> Option<String> {
        let scope = queue_desk_core::ScopeKey::new(
            queue_desk_core::BranchCode::new("MAIN"),
            "2025-01-01".parse().unwrap(),
        );
        self.sequences
            .load(scope)
            .await
            .unwrap()
            .and_then(|record| record.current_serving)
            .map(|queue_no| queue_no.to_string())
    }
}
