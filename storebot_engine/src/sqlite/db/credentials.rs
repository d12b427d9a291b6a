use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::{Credential, NewCredential}, traits::StorefrontError};

/// Bulk-inserts credentials into a product's pool. Returns the number of rows inserted.
pub async fn import_credentials(
    credentials: Vec<NewCredential>,
    conn: &mut SqliteConnection,
) -> Result<u64, StorefrontError> {
    let mut inserted = 0;
    for cred in credentials {
        let result = sqlx::query(
            r#"
                INSERT INTO credentials (product_id, login, password, pin, extra_info)
                VALUES ($1, $2, $3, $4, $5);
            "#,
        )
        .bind(cred.product_id)
        .bind(cred.login)
        .bind(cred.password)
        .bind(cred.pin)
        .bind(cred.extra_info)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }
    debug!("🗃️ {inserted} credentials imported");
    Ok(inserted)
}

/// The number of unsold credentials for a product. Advisory: the authoritative check is the allocation.
pub async fn available_stock(product_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM credentials WHERE product_id = $1 AND is_sold = 0")
            .bind(product_id)
            .fetch_one(conn)
            .await?;
    Ok(count)
}

pub async fn sold_count_for_category(category_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
            SELECT COUNT(*) FROM credentials
            JOIN products ON credentials.product_id = products.id
            WHERE products.parent_id = $1 AND credentials.is_sold = 1
        "#,
    )
    .bind(category_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Marks up to `quantity` unsold credentials as sold, oldest first, binding them to the given order row.
/// This is the allocation half of the settlement primitive: callers MUST run it inside a transaction and
/// roll back if fewer than `quantity` rows come back, otherwise a partial fulfilment could leak.
pub async fn allocate_credentials(
    product_id: i64,
    quantity: i64,
    order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Credential>, StorefrontError> {
    let allocated: Vec<Credential> = sqlx::query_as(
        r#"
            UPDATE credentials
            SET is_sold = 1, sold_at = CURRENT_TIMESTAMP, order_id = $1
            WHERE id IN (
                SELECT id FROM credentials
                WHERE product_id = $2 AND is_sold = 0
                ORDER BY created_at ASC, id ASC
                LIMIT $3
            )
            RETURNING *;
        "#,
    )
    .bind(order_pk)
    .bind(product_id)
    .bind(quantity)
    .fetch_all(conn)
    .await?;
    debug!("🗃️ Allocated {}/{quantity} credentials of product {product_id} to order row {order_pk}", allocated.len());
    Ok(allocated)
}

pub async fn credentials_for_order(order_pk: i64, conn: &mut SqliteConnection) -> Result<Vec<Credential>, sqlx::Error> {
    let creds = sqlx::query_as("SELECT * FROM credentials WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_pk)
        .fetch_all(conn)
        .await?;
    Ok(creds)
}

/// Deletes and returns all unsold credentials for a product. Sold rows are never touched, since they back
/// delivered orders.
pub async fn withdraw_unsold_credentials(
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Credential>, StorefrontError> {
    let withdrawn: Vec<Credential> =
        sqlx::query_as("DELETE FROM credentials WHERE product_id = $1 AND is_sold = 0 RETURNING *")
            .bind(product_id)
            .fetch_all(conn)
            .await?;
    debug!("🗃️ Withdrew {} unsold credentials of product {product_id}", withdrawn.len());
    Ok(withdrawn)
}
