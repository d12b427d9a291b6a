use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    order_objects::ProductUpdate,
    traits::StorefrontError,
};

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn fetch_active_products(conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    let products = sqlx::query_as("SELECT * FROM products WHERE is_active = 1 ORDER BY is_category DESC, name ASC")
        .fetch_all(conn)
        .await?;
    Ok(products)
}

pub async fn fetch_products_in_category(
    category_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Product>, sqlx::Error> {
    let products =
        sqlx::query_as("SELECT * FROM products WHERE parent_id = $1 AND is_active = 1 ORDER BY name ASC")
            .bind(category_id)
            .fetch_all(conn)
            .await?;
    Ok(products)
}

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, StorefrontError> {
    let product: Product = sqlx::query_as(
        r#"
            INSERT INTO products (name, description, price, is_category, parent_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(product.name)
    .bind(product.description)
    .bind(product.price)
    .bind(product.is_category)
    .bind(product.parent_id)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Product [{}] inserted with id {}", product.name, product.id);
    Ok(product)
}

/// Applies a partial update. Snapshotted fields on existing orders are unaffected.
pub async fn update_product(
    id: i64,
    update: ProductUpdate,
    conn: &mut SqliteConnection,
) -> Result<Product, StorefrontError> {
    if update.is_empty() {
        return fetch_product(id, conn).await?.ok_or(StorefrontError::ProductNotFound(id));
    }
    let result: Option<Product> = sqlx::query_as(
        r#"
            UPDATE products SET
                name = COALESCE($1, name),
                description = COALESCE($2, description),
                price = COALESCE($3, price)
            WHERE id = $4
            RETURNING *;
        "#,
    )
    .bind(update.new_name)
    .bind(update.new_description)
    .bind(update.new_price)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(StorefrontError::ProductNotFound(id))
}

/// Soft-delete. The row must remain so that order snapshots and sold credentials keep their links.
pub async fn deactivate_product(id: i64, conn: &mut SqliteConnection) -> Result<Product, StorefrontError> {
    let result: Option<Product> =
        sqlx::query_as("UPDATE products SET is_active = 0 WHERE id = $1 RETURNING *").bind(id).fetch_optional(conn).await?;
    result.ok_or(StorefrontError::ProductNotFound(id))
}
