//! Row decoding.

use queue_desk_core::store::StoreError;
use queue_desk_core::{
    BranchCode, DateKey, QueueNumber, ScopeKey, SequenceRecord, Ticket, TicketId,
};
use sqlx::Row;
use sqlx::postgres::PgRow;

/// Columns selected for a ticket, in [`ticket_from_row`] order.
pub const TICKET_COLUMNS: &str = "id, seq, queue_no, branch, date_key, category, full_name, \
     mobile, purpose, status, serve_scope, called_at, completed_at, created_at";

/// Columns selected for a sequence record.
pub const SEQUENCE_COLUMNS: &str = "branch, date_key, last_number, current_serving, updated_at";

pub fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::DatabaseError(e.to_string())
}

fn decode_error(column: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::SerializationError(format!("Invalid {column}: {e}"))
}

fn parse_queue_no(column: &str, text: &str) -> Result<QueueNumber, StoreError> {
    text.parse().map_err(|e| decode_error(column, e))
}

pub fn ticket_from_row(row: &PgRow) -> Result<Ticket, StoreError> {
    let status: String = row.try_get("status").map_err(db_error)?;
    let purpose: String = row.try_get("purpose").map_err(db_error)?;
    let serve_scope: Option<String> = row.try_get("serve_scope").map_err(db_error)?;
    let queue_no: String = row.try_get("queue_no").map_err(db_error)?;
    let branch: String = row.try_get("branch").map_err(db_error)?;

    Ok(Ticket {
        id: TicketId::from_uuid(row.try_get("id").map_err(db_error)?),
        seq: row.try_get("seq").map_err(db_error)?,
        queue_no: parse_queue_no("queue_no", &queue_no)?,
        branch: BranchCode::new(branch),
        date_key: DateKey::new(row.try_get("date_key").map_err(db_error)?),
        category: row.try_get("category").map_err(db_error)?,
        full_name: row.try_get("full_name").map_err(db_error)?,
        mobile: row.try_get("mobile").map_err(db_error)?,
        purpose: purpose.parse().map_err(|e| decode_error("purpose", e))?,
        status: status.parse().map_err(|e| decode_error("status", e))?,
        serve_scope: serve_scope
            .map(|s| s.parse().map_err(|e| decode_error("serve_scope", e)))
            .transpose()?,
        called_at: row.try_get("called_at").map_err(db_error)?,
        completed_at: row.try_get("completed_at").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
    })
}

pub fn sequence_from_row(row: &PgRow) -> Result<SequenceRecord, StoreError> {
    let branch: String = row.try_get("branch").map_err(db_error)?;
    let last_number: i32 = row.try_get("last_number").map_err(db_error)?;
    let current_serving: Option<String> = row.try_get("current_serving").map_err(db_error)?;

    Ok(SequenceRecord {
        scope: ScopeKey::new(
            BranchCode::new(branch),
            DateKey::new(row.try_get("date_key").map_err(db_error)?),
        ),
        last_number: u32::try_from(last_number).map_err(|e| decode_error("last_number", e))?,
        current_serving: current_serving
            .map(|text| parse_queue_no("current_serving", &text))
            .transpose()?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}
