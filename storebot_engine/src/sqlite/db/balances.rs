use log::debug;
use sbt_common::Rupiah;
use sqlx::SqliteConnection;

use crate::{
    db_types::{BalanceEntry, EntryType, UserBalance},
    traits::StorefrontError,
};

pub async fn fetch_user_balance(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<UserBalance>, sqlx::Error> {
    let balance =
        sqlx::query_as("SELECT * FROM user_balances WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(balance)
}

/// Credits the user's balance and records the matching ledger entry. Callers compose this inside a
/// transaction with whatever state change justifies the credit. Returns the new balance.
#[allow(clippy::too_many_arguments)]
pub async fn credit_balance(
    user_id: i64,
    username: Option<&str>,
    amount: Rupiah,
    entry_type: EntryType,
    description: &str,
    order_pk: Option<i64>,
    topup_pk: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Rupiah, StorefrontError> {
    let (new_balance,): (Rupiah,) = sqlx::query_as(
        r#"
            INSERT INTO user_balances (user_id, username, balance)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                balance = balance + excluded.balance,
                username = COALESCE(excluded.username, username),
                updated_at = CURRENT_TIMESTAMP
            RETURNING balance;
        "#,
    )
    .bind(user_id)
    .bind(username)
    .bind(amount)
    .fetch_one(&mut *conn)
    .await?;
    insert_ledger_entry(user_id, amount, entry_type, description, order_pk, topup_pk, conn).await?;
    debug!("🗃️ Credited {amount} to user {user_id} ({entry_type}). New balance: {new_balance}");
    Ok(new_balance)
}

/// Debits the user's balance and records the matching ledger entry. The `balance >= amount` guard lives in
/// the statement: when it fails the update matches zero rows, nothing is written, and the caller gets
/// `InsufficientFunds` carrying the current balance.
pub async fn debit_balance(
    user_id: i64,
    amount: Rupiah,
    description: &str,
    order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<Rupiah, StorefrontError> {
    let result: Option<(Rupiah,)> = sqlx::query_as(
        r#"
            UPDATE user_balances
            SET balance = balance - $1, updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $2 AND balance >= $1
            RETURNING balance;
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    match result {
        Some((new_balance,)) => {
            insert_ledger_entry(user_id, -amount, EntryType::Payment, description, Some(order_pk), None, conn).await?;
            debug!("🗃️ Debited {amount} from user {user_id}. New balance: {new_balance}");
            Ok(new_balance)
        },
        None => {
            let available =
                fetch_user_balance(user_id, conn).await?.map(|b| b.balance).unwrap_or_else(|| Rupiah::from(0));
            Err(StorefrontError::InsufficientFunds { required: amount, available })
        },
    }
}

/// Returns the compensating credit for a failed fulfilment. Same mechanics as a top-up credit, but typed as
/// a refund in the ledger.
pub async fn refund_balance(
    user_id: i64,
    amount: Rupiah,
    description: &str,
    order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<Rupiah, StorefrontError> {
    credit_balance(user_id, None, amount, EntryType::Refund, description, Some(order_pk), None, conn).await
}

pub async fn transaction_history(
    user_id: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<BalanceEntry>, sqlx::Error> {
    let entries =
        sqlx::query_as("SELECT * FROM balance_transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2")
            .bind(user_id)
            .bind(limit)
            .fetch_all(conn)
            .await?;
    Ok(entries)
}

async fn insert_ledger_entry(
    user_id: i64,
    amount: Rupiah,
    entry_type: EntryType,
    description: &str,
    order_pk: Option<i64>,
    topup_pk: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<(), StorefrontError> {
    sqlx::query(
        r#"
            INSERT INTO balance_transactions (user_id, amount, entry_type, description, order_id, topup_id)
            VALUES ($1, $2, $3, $4, $5, $6);
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(entry_type)
    .bind(description)
    .bind(order_pk)
    .bind(topup_pk)
    .execute(conn)
    .await?;
    Ok(())
}
