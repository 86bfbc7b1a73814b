//! In-memory store implementations
//!
//! Provides fast, deterministic stores with the same guarantees the database
//! gives: atomic counter increments, conditional status writes and a single
//! SERVING ticket per `(branch, date_key, category)`.
//!
//! Each operation runs in one synchronous critical section; no lock is held
//! across an `.await`.

use queue_desk_core::store::{StoreError, StoreFuture};
use queue_desk_core::{
    BranchCode, DateKey, NewTicket, QueueNumber, ScopeKey, SequenceRecord, SequenceStore,
    ServingPointerUpdate, Ticket, TicketId, TicketQuery, TicketStatus, TicketStore, Transition,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

fn poisoned() -> StoreError {
    StoreError::DatabaseError("in-memory store lock poisoned".to_string())
}

/// In-memory sequence store for fast, deterministic testing.
///
/// # Example
///
/// ```
/// use queue_desk_testing::InMemorySequenceStore;
/// use queue_desk_core::store::SequenceStore;
/// use queue_desk_core::{BranchCode, ScopeKey};
/// use chrono::Utc;
///
/// # tokio_test::block_on(async {
/// let store = InMemorySequenceStore::new();
/// let scope = ScopeKey::new(BranchCode::new("MAIN"), "2025-01-01".parse().unwrap());
///
/// store.next_number(scope.clone(), Utc::now()).await.unwrap();
/// let record = store.load(scope).await.unwrap().unwrap();
/// assert_eq!(record.last_number, 1);
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemorySequenceStore {
    records: Arc<RwLock<HashMap<ScopeKey, SequenceRecord>>>,
    fail_pointer_updates: Arc<AtomicBool>,
}

impl InMemorySequenceStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `update_current_serving` call fail with `DatabaseError`.
    ///
    /// Useful for exercising best-effort pointer maintenance.
    pub fn fail_pointer_updates(&self, fail: bool) {
        self.fail_pointer_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of scopes with a record
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map_or(0, |records| records.len())
    }

    /// Check if no record exists
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn increment(&self, scope: ScopeKey, at: DateTime<Utc>) -> Result<u32, StoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let record = records
            .entry(scope.clone())
            .or_insert_with(|| SequenceRecord::fresh(scope, at));
        record.last_number += 1;
        record.updated_at = at;
        Ok(record.last_number)
    }

    fn point(
        &self,
        scope: ScopeKey,
        update: ServingPointerUpdate,
        at: DateTime<Utc>,
    ) -> Result<SequenceRecord, StoreError> {
        if self.fail_pointer_updates.load(Ordering::SeqCst) {
            return Err(StoreError::DatabaseError(
                "pointer update failure injected".to_string(),
            ));
        }
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let record = records
            .entry(scope.clone())
            .or_insert_with(|| SequenceRecord::fresh(scope, at));
        record.apply_pointer(update, at);
        Ok(record.clone())
    }

    fn reset_scope(&self, scope: ScopeKey, at: DateTime<Utc>) -> Result<SequenceRecord, StoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let record = SequenceRecord::fresh(scope.clone(), at);
        records.insert(scope, record.clone());
        Ok(record)
    }
}

impl SequenceStore for InMemorySequenceStore {
    fn next_number(&self, scope: ScopeKey, at: DateTime<Utc>) -> StoreFuture<'_, u32> {
        Box::pin(async move { self.increment(scope, at) })
    }

    fn load(&self, scope: ScopeKey) -> StoreFuture<'_, Option<SequenceRecord>> {
        Box::pin(async move {
            let records = self.records.read().map_err(|_| poisoned())?;
            Ok(records.get(&scope).cloned())
        })
    }

    fn update_current_serving(
        &self,
        scope: ScopeKey,
        update: ServingPointerUpdate,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, SequenceRecord> {
        Box::pin(async move { self.point(scope, update, at) })
    }

    fn reset(&self, scope: ScopeKey, at: DateTime<Utc>) -> StoreFuture<'_, SequenceRecord> {
        Box::pin(async move { self.reset_scope(scope, at) })
    }
}

#[derive(Debug, Default)]
struct TicketTable {
    tickets: HashMap<TicketId, Ticket>,
    next_seq: i64,
}

impl TicketTable {
    fn insert(&mut self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let duplicate = self.tickets.values().any(|t| {
            t.branch == ticket.branch && t.date_key == ticket.date_key && t.queue_no == ticket.queue_no
        });
        if duplicate {
            return Err(StoreError::DuplicateQueueNumber {
                scope: ScopeKey::new(ticket.branch, ticket.date_key),
                queue_no: ticket.queue_no,
            });
        }
        self.next_seq += 1;
        let stored = ticket.into_ticket(self.next_seq);
        self.tickets.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn transition(&mut self, id: TicketId, change: Transition) -> Result<Ticket, StoreError> {
        let current = self.tickets.get(&id).ok_or(StoreError::TicketNotFound(id))?;
        if current.status != change.from {
            return Err(StoreError::StatusConflict {
                ticket_id: id,
                expected: change.from,
                actual: current.status,
            });
        }
        if change.to == TicketStatus::Serving {
            let slot_taken = self.tickets.values().any(|t| {
                t.id != id
                    && t.status == TicketStatus::Serving
                    && t.branch == current.branch
                    && t.date_key == current.date_key
                    && t.category == current.category
            });
            if slot_taken {
                return Err(StoreError::ServingSlotTaken {
                    branch: current.branch.clone(),
                    category: current.category.clone(),
                });
            }
        }

        let ticket = self.tickets.get_mut(&id).ok_or(StoreError::TicketNotFound(id))?;
        ticket.apply(&change);
        Ok(ticket.clone())
    }

    fn list(&self, query: &TicketQuery) -> Vec<Ticket> {
        let mut matching: Vec<Ticket> = self
            .tickets
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        matching.sort_by_key(Ticket::queue_order);
        matching
    }
}

/// In-memory ticket store for fast, deterministic testing.
///
/// Enforces unique queue numbers per `(branch, date_key)`, conditional status
/// writes and the single-SERVING-per-category rule.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTicketStore {
    table: Arc<RwLock<TicketTable>>,
    fail_listing: Arc<AtomicBool>,
}

impl InMemoryTicketStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `list` call fail with `DatabaseError`.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Number of stored tickets
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().map_or(0, |table| table.tickets.len())
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored ticket in queue order, for assertions.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Ticket> {
        self.table.read().map_or_else(
            |_| Vec::new(),
            |table| {
                let mut all: Vec<Ticket> = table.tickets.values().cloned().collect();
                all.sort_by_key(Ticket::queue_order);
                all
            },
        )
    }
}

impl TicketStore for InMemoryTicketStore {
    fn insert(&self, ticket: NewTicket) -> StoreFuture<'_, Ticket> {
        Box::pin(async move {
            let mut table = self.table.write().map_err(|_| poisoned())?;
            table.insert(ticket)
        })
    }

    fn find(&self, id: TicketId) -> StoreFuture<'_, Option<Ticket>> {
        Box::pin(async move {
            let table = self.table.read().map_err(|_| poisoned())?;
            Ok(table.tickets.get(&id).cloned())
        })
    }

    fn find_by_queue_no(
        &self,
        branch: BranchCode,
        date_key: DateKey,
        queue_no: QueueNumber,
    ) -> StoreFuture<'_, Option<Ticket>> {
        Box::pin(async move {
            let table = self.table.read().map_err(|_| poisoned())?;
            Ok(table
                .tickets
                .values()
                .find(|t| t.branch == branch && t.date_key == date_key && t.queue_no == queue_no)
                .cloned())
        })
    }

    fn list(&self, query: TicketQuery) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move {
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(StoreError::DatabaseError("list failure injected".to_string()));
            }
            let table = self.table.read().map_err(|_| poisoned())?;
            Ok(table.list(&query))
        })
    }

    fn transition(&self, id: TicketId, change: Transition) -> StoreFuture<'_, Ticket> {
        Box::pin(async move {
            let mut table = self.table.write().map_err(|_| poisoned())?;
            table.transition(id, change)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fixtures::TicketFixture;
    use crate::test_clock;
    use queue_desk_core::ServeScope;
    use queue_desk_core::environment::Clock;

    fn scope() -> ScopeKey {
        ScopeKey::new(BranchCode::new("MAIN"), "2025-01-01".parse().unwrap())
    }

    #[tokio::test]
    async fn next_number_is_gap_free_under_concurrency() {
        let store = InMemorySequenceStore::new();
        let now = test_clock().now();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.next_number(scope(), now).await.unwrap() })
            })
            .collect();

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap());
        }
        values.sort_unstable();
        assert_eq!(values, (1..=64).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn reset_restarts_counter() {
        let store = InMemorySequenceStore::new();
        let now = test_clock().now();
        store.next_number(scope(), now).await.unwrap();
        store.next_number(scope(), now).await.unwrap();

        let record = store.reset(scope(), now).await.unwrap();
        assert_eq!(record.last_number, 0);
        assert_eq!(store.next_number(scope(), now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pointer_update_failure_injection() {
        let store = InMemorySequenceStore::new();
        let now = test_clock().now();
        store.fail_pointer_updates(true);

        let result = store
            .update_current_serving(scope(), ServingPointerUpdate::Clear, now)
            .await;
        assert!(matches!(result, Err(StoreError::DatabaseError(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn rejects_duplicate_queue_numbers() {
        let store = InMemoryTicketStore::new();
        store.insert(TicketFixture::new("MAIN", "A-001").build()).await.unwrap();

        let duplicate = store.insert(TicketFixture::new("MAIN", "A-001").build()).await;
        assert!(matches!(duplicate, Err(StoreError::DuplicateQueueNumber { .. })));

        // Same number on another branch is fine.
        store.insert(TicketFixture::new("NORTH", "A-001").build()).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn transition_is_conditional() {
        let store = InMemoryTicketStore::new();
        let now = test_clock().now();
        let ticket = store.insert(TicketFixture::new("MAIN", "A-001").build()).await.unwrap();

        let stale = Transition::new(TicketStatus::Serving, TicketStatus::Done, now);
        let err = store.transition(ticket.id, stale).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::StatusConflict {
                ticket_id: ticket.id,
                expected: TicketStatus::Serving,
                actual: TicketStatus::Waiting,
            }
        );

        let call = Transition::to_serving(TicketStatus::Waiting, ServeScope::Branch, now);
        let serving = store.transition(ticket.id, call).await.unwrap();
        assert_eq!(serving.status, TicketStatus::Serving);
        assert_eq!(serving.called_at, Some(now));
        assert_eq!(serving.serve_scope, Some(ServeScope::Branch));

        let missing = store.transition(TicketId::new(), call).await.unwrap_err();
        assert!(matches!(missing, StoreError::TicketNotFound(_)));
    }

    #[tokio::test]
    async fn one_serving_ticket_per_category() {
        let store = InMemoryTicketStore::new();
        let now = test_clock().now();
        let first = store
            .insert(TicketFixture::new("MAIN", "A-001").category("X").build())
            .await
            .unwrap();
        let second = store
            .insert(TicketFixture::new("MAIN", "A-002").category("X").build())
            .await
            .unwrap();
        let other = store
            .insert(TicketFixture::new("MAIN", "A-003").category("Y").build())
            .await
            .unwrap();

        let call = Transition::to_serving(TicketStatus::Waiting, ServeScope::Category, now);
        store.transition(first.id, call).await.unwrap();

        let err = store.transition(second.id, call).await.unwrap_err();
        assert!(matches!(err, StoreError::ServingSlotTaken { ref category, .. } if category == "X"));

        store.transition(other.id, call).await.unwrap();

        let done = Transition::new(TicketStatus::Serving, TicketStatus::Done, now);
        store.transition(first.id, done).await.unwrap();
        store.transition(second.id, call).await.unwrap();
    }

    #[tokio::test]
    async fn list_orders_by_created_at_then_seq() {
        let store = InMemoryTicketStore::new();
        let clock = test_clock();
        let later = clock.now() + chrono::Duration::minutes(5);

        store
            .insert(TicketFixture::new("MAIN", "A-003").created_at(later).build())
            .await
            .unwrap();
        store
            .insert(TicketFixture::new("MAIN", "A-001").created_at(clock.now()).build())
            .await
            .unwrap();
        store
            .insert(TicketFixture::new("MAIN", "A-002").created_at(clock.now()).build())
            .await
            .unwrap();

        let listed = store
            .list(TicketQuery::new(BranchCode::new("MAIN"), "2025-01-01".parse().unwrap()))
            .await
            .unwrap();
        let numbers: Vec<String> = listed.iter().map(|t| t.queue_no.to_string()).collect();
        assert_eq!(numbers, ["A-001", "A-002", "A-003"]);
    }
}
