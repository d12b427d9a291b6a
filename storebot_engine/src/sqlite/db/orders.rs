use chrono::Duration;
use log::{debug, trace};
use sbt_common::Rupiah;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, PaymentStatus},
    order_objects::{ModifyOrderRequest, OrderQueryFilter},
    traits::StorefrontError,
};

/// Inserts a new order into the database using the given connection. This is not atomic on its own. You can
/// embed this call inside a transaction if you need atomicity, and pass `&mut *tx` as the connection
/// argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StorefrontError> {
    let order_id = order.order_id.clone();
    let result: Result<Order, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                buyer_id,
                buyer_username,
                product_id,
                product_name,
                quantity,
                total_price,
                amount_due,
                status,
                source,
                voucher_code,
                discount,
                memo,
                paid_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                CASE WHEN $9 = 'paid' THEN CURRENT_TIMESTAMP ELSE NULL END)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.buyer_id)
    .bind(order.buyer_username)
    .bind(order.product_id)
    .bind(order.product_name)
    .bind(order.quantity)
    .bind(order.total_price)
    .bind(order.amount_due)
    .bind(order.status)
    .bind(order.source)
    .bind(order.voucher_code)
    .bind(order.discount)
    .bind(order.memo)
    .fetch_one(conn)
    .await;
    match result {
        Ok(order) => {
            debug!("🗃️ Order [{}] inserted with id {}", order.order_id, order.id);
            Ok(order)
        },
        Err(e) if e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false) => {
            Err(StorefrontError::OrderAlreadyExists(order_id))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at` in ascending order.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.as_str().to_string());
    }
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(product_id) = query.product_id {
        where_clause.push("product_id = ");
        where_clause.push_bind_unseparated(product_id);
    }
    if let Some(memo) = query.memo {
        where_clause.push("memo LIKE ");
        where_clause.push_bind_unseparated(format!("%{memo}%"));
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

pub async fn update_order(
    id: &OrderId,
    update: ModifyOrderRequest,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorefrontError> {
    if update.is_empty() {
        debug!("🗃️ No fields to update for order {id}. Update request skipped.");
        return Err(StorefrontError::OrderModificationNoOp);
    }
    let mut builder = QueryBuilder::new("UPDATE orders SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    if let Some(status) = update.new_status {
        set_clause.push("status = ");
        set_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(memo) = update.new_memo {
        set_clause.push("memo = ");
        set_clause.push_bind_unseparated(memo);
    }
    if let Some(total_price) = update.new_total_price {
        set_clause.push("total_price = ");
        set_clause.push_bind_unseparated(total_price);
    }
    builder.push(" WHERE order_id = ");
    builder.push_bind(id.as_str());
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let res = builder.build().fetch_optional(conn).await?.map(|row: SqliteRow| Order::from_row(&row)).transpose()?;
    trace!("🗃️ Result of update_order: {res:?}");
    Ok(res)
}

pub async fn set_qr_message(
    order_id: &OrderId,
    chat_id: i64,
    message_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Order, StorefrontError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET chat_id = $1, qr_message_id = $2, updated_at = CURRENT_TIMESTAMP WHERE order_id = $3 \
         RETURNING *",
    )
    .bind(chat_id)
    .bind(message_id)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| StorefrontError::OrderNotFound(order_id.clone()))
}

/// Conditionally moves a pending order into the given terminal state. The `status = 'pending'` guard in the
/// statement is what makes terminal states monotone: once an order has left `pending`, this update matches
/// zero rows and the caller gets `None`.
pub async fn transition_pending_order(
    order_id: &OrderId,
    new_status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorefrontError> {
    let paid_at = if new_status == PaymentStatus::Paid { "CURRENT_TIMESTAMP" } else { "paid_at" };
    let sql = format!(
        "UPDATE orders SET status = $1, paid_at = {paid_at}, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND \
         status = 'pending' RETURNING *"
    );
    let result: Option<Order> =
        sqlx::query_as(&sql).bind(new_status).bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(result)
}

/// Finds the oldest pending order whose charged amount lies within `tolerance` rupiah of `amount`.
pub async fn find_pending_by_amount(
    amount: Rupiah,
    tolerance: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "SELECT * FROM orders WHERE status = 'pending' AND ABS(amount_due - $1) <= $2 ORDER BY created_at ASC LIMIT 1",
    )
    .bind(amount)
    .bind(tolerance)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Expires every pending order whose creation time is more than `ttl` in the past. Paid and otherwise
/// terminal orders are untouched by the status guard.
pub async fn expire_orders(limit: Duration, conn: &mut SqliteConnection) -> Result<Vec<Order>, StorefrontError> {
    let rows = sqlx::query_as(
        format!(
            "UPDATE orders SET updated_at = CURRENT_TIMESTAMP, status = 'expired' WHERE status = 'pending' AND \
             (unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at)) > {} RETURNING *;",
            limit.num_seconds()
        )
        .as_str(),
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
