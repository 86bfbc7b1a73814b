//! `PostgreSQL` implementation of the sequence and ticket stores.

use crate::rows::{SEQUENCE_COLUMNS, TICKET_COLUMNS, db_error, sequence_from_row, ticket_from_row};
use chrono::{DateTime, Utc};
use queue_desk_core::store::{StoreError, StoreFuture};
use queue_desk_core::{
    BranchCode, DateKey, NewTicket, QueueNumber, ScopeKey, SequenceRecord, SequenceStore,
    ServeScope, ServingPointerUpdate, Ticket, TicketId, TicketQuery, TicketStatus, TicketStore,
    Transition,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Instant;

const QUEUE_NO_CONSTRAINT: &str = "tickets_queue_no_unique";
const SERVING_SLOT_INDEX: &str = "tickets_one_serving_per_category";

fn observe(op: &'static str, started: Instant) {
    metrics::histogram!("store_operation_duration_seconds", "op" => op)
        .record(started.elapsed().as_secs_f64());
}

/// Name of the unique constraint a statement violated, if any.
fn violated_constraint(e: &sqlx::Error) -> Option<String> {
    let db = e.as_database_error()?;
    if db.is_unique_violation() {
        db.constraint().map(str::to_string)
    } else {
        None
    }
}

/// `PostgreSQL`-backed sequence and ticket store.
///
/// Cloning is cheap: clones share the connection pool.
#[derive(Clone, Debug)]
pub struct PostgresQueueStore {
    pool: PgPool,
}

impl PostgresQueueStore {
    /// Connect to `database_url` with a default pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the connection fails.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .connect(database_url)
            .await
            .map_err(db_error)?;
        Ok(Self { pool })
    }

    /// Create a store from an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Migration failed: {e}")))?;
        tracing::info!("Queue desk migrations applied");
        Ok(())
    }

    async fn write_pointer(
        &self,
        scope: &ScopeKey,
        update: ServingPointerUpdate,
        at: DateTime<Utc>,
    ) -> Result<SequenceRecord, StoreError> {
        let row = match update {
            ServingPointerUpdate::Set(queue_no) => {
                self.upsert_pointer(scope, Some(queue_no.to_string()), at).await?
            }
            ServingPointerUpdate::Clear => self.upsert_pointer(scope, None, at).await?,
            ServingPointerUpdate::ClearIfCurrent(queue_no) => {
                sqlx::query(&format!(
                    r"
                    INSERT INTO sequence_state (branch, date_key, last_number, current_serving, updated_at)
                    VALUES ($1, $2, 0, NULL, $4)
                    ON CONFLICT (branch, date_key) DO UPDATE SET
                        current_serving = CASE
                            WHEN sequence_state.current_serving = $3 THEN NULL
                            ELSE sequence_state.current_serving
                        END,
                        updated_at = CASE
                            WHEN sequence_state.current_serving = $3 THEN $4
                            ELSE sequence_state.updated_at
                        END
                    RETURNING {SEQUENCE_COLUMNS}
                    "
                ))
                .bind(scope.branch.as_str())
                .bind(scope.date_key.date())
                .bind(queue_no.to_string())
                .bind(at)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?
            }
        };
        sequence_from_row(&row)
    }

    async fn upsert_pointer(
        &self,
        scope: &ScopeKey,
        current_serving: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<sqlx::postgres::PgRow, StoreError> {
        sqlx::query(&format!(
            r"
            INSERT INTO sequence_state (branch, date_key, last_number, current_serving, updated_at)
            VALUES ($1, $2, 0, $3, $4)
            ON CONFLICT (branch, date_key) DO UPDATE SET current_serving = $3, updated_at = $4
            RETURNING {SEQUENCE_COLUMNS}
            "
        ))
        .bind(scope.branch.as_str())
        .bind(scope.date_key.date())
        .bind(current_serving)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO tickets (
                id, queue_no, branch, date_key, category, full_name, mobile,
                purpose, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'WAITING', $9)
            RETURNING seq
            ",
        )
        .bind(ticket.id.as_uuid())
        .bind(ticket.queue_no.to_string())
        .bind(ticket.branch.as_str())
        .bind(ticket.date_key.date())
        .bind(&ticket.category)
        .bind(&ticket.full_name)
        .bind(&ticket.mobile)
        .bind(ticket.purpose.as_str())
        .bind(ticket.created_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                let seq: i64 = sqlx::Row::try_get(&row, "seq").map_err(db_error)?;
                tracing::debug!(branch = %ticket.branch, queue_no = %ticket.queue_no, seq, "Ticket inserted");
                Ok(ticket.into_ticket(seq))
            }
            Err(e) if violated_constraint(&e).as_deref() == Some(QUEUE_NO_CONSTRAINT) => {
                Err(StoreError::DuplicateQueueNumber {
                    scope: ScopeKey::new(ticket.branch, ticket.date_key),
                    queue_no: ticket.queue_no,
                })
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        let row = sqlx::query(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn transition_ticket(&self, id: TicketId, change: Transition) -> Result<Ticket, StoreError> {
        let serve_scope = (change.to == TicketStatus::Serving)
            .then(|| change.serve_scope.unwrap_or(ServeScope::Branch).as_str());
        let called_at = (change.to == TicketStatus::Serving).then_some(change.at);
        let completed_at = change.to.is_terminal().then_some(change.at);

        let result = sqlx::query(&format!(
            r"
            UPDATE tickets
            SET status = $3,
                serve_scope = COALESCE($4, serve_scope),
                called_at = COALESCE($5, called_at),
                completed_at = COALESCE($6, completed_at)
            WHERE id = $1 AND status = $2
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(id.as_uuid())
        .bind(change.from.as_str())
        .bind(change.to.as_str())
        .bind(serve_scope)
        .bind(called_at)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => ticket_from_row(&row),
            Ok(None) => {
                // Lost the compare-and-set, or the ticket does not exist.
                let current = self.find_ticket(id).await?.ok_or(StoreError::TicketNotFound(id))?;
                Err(StoreError::StatusConflict {
                    ticket_id: id,
                    expected: change.from,
                    actual: current.status,
                })
            }
            Err(e) if violated_constraint(&e).as_deref() == Some(SERVING_SLOT_INDEX) => {
                let current = self.find_ticket(id).await?.ok_or(StoreError::TicketNotFound(id))?;
                Err(StoreError::ServingSlotTaken {
                    branch: current.branch,
                    category: current.category,
                })
            }
            Err(e) => Err(db_error(e)),
        }
    }
}

impl SequenceStore for PostgresQueueStore {
    fn next_number(&self, scope: ScopeKey, at: DateTime<Utc>) -> StoreFuture<'_, u32> {
        Box::pin(async move {
            let started = Instant::now();
            let (last_number,): (i32,) = sqlx::query_as(
                r"
                INSERT INTO sequence_state (branch, date_key, last_number, updated_at)
                VALUES ($1, $2, 1, $3)
                ON CONFLICT (branch, date_key) DO UPDATE
                    SET last_number = sequence_state.last_number + 1,
                        updated_at = EXCLUDED.updated_at
                RETURNING last_number
                ",
            )
            .bind(scope.branch.as_str())
            .bind(scope.date_key.date())
            .bind(at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
            observe("next_number", started);

            u32::try_from(last_number)
                .map_err(|e| StoreError::SerializationError(format!("Invalid last_number: {e}")))
        })
    }

    fn load(&self, scope: ScopeKey) -> StoreFuture<'_, Option<SequenceRecord>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {SEQUENCE_COLUMNS} FROM sequence_state WHERE branch = $1 AND date_key = $2"
            ))
            .bind(scope.branch.as_str())
            .bind(scope.date_key.date())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
            row.as_ref().map(sequence_from_row).transpose()
        })
    }

    fn update_current_serving(
        &self,
        scope: ScopeKey,
        update: ServingPointerUpdate,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, SequenceRecord> {
        Box::pin(async move {
            let started = Instant::now();
            let record = self.write_pointer(&scope, update, at).await?;
            observe("update_current_serving", started);
            Ok(record)
        })
    }

    fn reset(&self, scope: ScopeKey, at: DateTime<Utc>) -> StoreFuture<'_, SequenceRecord> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                r"
                INSERT INTO sequence_state (branch, date_key, last_number, current_serving, updated_at)
                VALUES ($1, $2, 0, NULL, $3)
                ON CONFLICT (branch, date_key) DO UPDATE
                    SET last_number = 0, current_serving = NULL, updated_at = $3
                RETURNING {SEQUENCE_COLUMNS}
                "
            ))
            .bind(scope.branch.as_str())
            .bind(scope.date_key.date())
            .bind(at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

            tracing::warn!(%scope, "Sequence counter reset");
            sequence_from_row(&row)
        })
    }
}

impl TicketStore for PostgresQueueStore {
    fn insert(&self, ticket: NewTicket) -> StoreFuture<'_, Ticket> {
        Box::pin(async move {
            let started = Instant::now();
            let inserted = self.insert_ticket(ticket).await;
            observe("insert", started);
            inserted
        })
    }

    fn find(&self, id: TicketId) -> StoreFuture<'_, Option<Ticket>> {
        Box::pin(self.find_ticket(id))
    }

    fn find_by_queue_no(
        &self,
        branch: BranchCode,
        date_key: DateKey,
        queue_no: QueueNumber,
    ) -> StoreFuture<'_, Option<Ticket>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {TICKET_COLUMNS} FROM tickets WHERE branch = $1 AND date_key = $2 AND queue_no = $3"
            ))
            .bind(branch.as_str())
            .bind(date_key.date())
            .bind(queue_no.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
            row.as_ref().map(ticket_from_row).transpose()
        })
    }

    fn list(&self, query: TicketQuery) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move {
            let started = Instant::now();
            let statuses: Vec<String> = query
                .statuses
                .iter()
                .map(|status| status.as_str().to_string())
                .collect();

            let rows = sqlx::query(&format!(
                r"
                SELECT {TICKET_COLUMNS}
                FROM tickets
                WHERE branch = $1
                  AND date_key = $2
                  AND (cardinality($3::text[]) = 0 OR status = ANY($3))
                  AND ($4::text IS NULL OR category = $4)
                ORDER BY created_at ASC, seq ASC
                "
            ))
            .bind(query.branch.as_str())
            .bind(query.date_key.date())
            .bind(statuses)
            .bind(query.category)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
            observe("list", started);

            rows.iter().map(ticket_from_row).collect()
        })
    }

    fn transition(&self, id: TicketId, change: Transition) -> StoreFuture<'_, Ticket> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.transition_ticket(id, change).await;
            observe("transition", started);
            result
        })
    }
}
