use chrono::Duration;
use log::debug;
use sbt_common::Rupiah;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTopup, OrderId, PaymentStatus, TopupRequest},
    traits::StorefrontError,
};

pub async fn insert_topup(topup: NewTopup, conn: &mut SqliteConnection) -> Result<TopupRequest, StorefrontError> {
    let topup_id = topup.topup_id.clone();
    let result: Result<TopupRequest, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO topup_requests (topup_id, user_id, username, amount, amount_due)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(topup.topup_id)
    .bind(topup.user_id)
    .bind(topup.username)
    .bind(topup.amount)
    .bind(topup.amount_due)
    .fetch_one(conn)
    .await;
    match result {
        Ok(topup) => {
            debug!("🗃️ Top-up [{}] inserted with id {}", topup.topup_id, topup.id);
            Ok(topup)
        },
        Err(e) if e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false) => {
            Err(StorefrontError::OrderAlreadyExists(topup_id))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_topup_by_topup_id(
    topup_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<TopupRequest>, sqlx::Error> {
    let topup = sqlx::query_as("SELECT * FROM topup_requests WHERE topup_id = $1")
        .bind(topup_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(topup)
}

pub async fn find_pending_by_amount(
    amount: Rupiah,
    tolerance: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<TopupRequest>, sqlx::Error> {
    let topup = sqlx::query_as(
        "SELECT * FROM topup_requests WHERE status = 'pending' AND ABS(amount_due - $1) <= $2 ORDER BY created_at ASC \
         LIMIT 1",
    )
    .bind(amount)
    .bind(tolerance)
    .fetch_optional(conn)
    .await?;
    Ok(topup)
}

pub async fn set_qr_message(
    topup_id: &OrderId,
    chat_id: i64,
    message_id: i64,
    conn: &mut SqliteConnection,
) -> Result<TopupRequest, StorefrontError> {
    let result: Option<TopupRequest> = sqlx::query_as(
        "UPDATE topup_requests SET chat_id = $1, qr_message_id = $2, updated_at = CURRENT_TIMESTAMP WHERE topup_id = \
         $3 RETURNING *",
    )
    .bind(chat_id)
    .bind(message_id)
    .bind(topup_id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| StorefrontError::TopupNotFound(topup_id.clone()))
}

/// Conditionally moves a pending top-up into the given terminal state. Zero rows matched means the top-up
/// already left `pending`.
pub async fn transition_pending_topup(
    topup_id: &OrderId,
    new_status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<TopupRequest>, StorefrontError> {
    let paid_at = if new_status == PaymentStatus::Paid { "CURRENT_TIMESTAMP" } else { "paid_at" };
    let sql = format!(
        "UPDATE topup_requests SET status = $1, paid_at = {paid_at}, updated_at = CURRENT_TIMESTAMP WHERE topup_id = \
         $2 AND status = 'pending' RETURNING *"
    );
    let result: Option<TopupRequest> =
        sqlx::query_as(&sql).bind(new_status).bind(topup_id.as_str()).fetch_optional(conn).await?;
    Ok(result)
}

pub async fn expire_topups(limit: Duration, conn: &mut SqliteConnection) -> Result<Vec<TopupRequest>, StorefrontError> {
    let rows = sqlx::query_as(
        format!(
            "UPDATE topup_requests SET updated_at = CURRENT_TIMESTAMP, status = 'expired' WHERE status = 'pending' \
             AND (unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at)) > {} RETURNING *;",
            limit.num_seconds()
        )
        .as_str(),
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
