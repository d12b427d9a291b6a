use chrono::Utc;
use log::debug;
use sbt_common::Rupiah;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewVoucher, Voucher},
    traits::{StorefrontError, VoucherError},
};

pub async fn fetch_voucher(code: &str, conn: &mut SqliteConnection) -> Result<Option<Voucher>, sqlx::Error> {
    // The code column is COLLATE NOCASE, so lookups are case-insensitive.
    let voucher = sqlx::query_as("SELECT * FROM vouchers WHERE code = $1").bind(code).fetch_optional(conn).await?;
    Ok(voucher)
}

/// Consumes one use of the voucher. Every usability condition is part of the UPDATE's WHERE clause, so the
/// increment and the checks are a single atomic statement: concurrent redemptions can never push
/// `used_count` past `max_uses`. When the guarded update matches nothing, the voucher is re-fetched to
/// produce a precise error.
pub async fn redeem_voucher(
    code: &str,
    order_total: Rupiah,
    conn: &mut SqliteConnection,
) -> Result<Voucher, StorefrontError> {
    let result: Option<Voucher> = sqlx::query_as(
        r#"
            UPDATE vouchers SET used_count = used_count + 1
            WHERE code = $1
              AND is_active = 1
              AND (max_uses IS NULL OR used_count < max_uses)
              AND (valid_until IS NULL OR valid_until > CURRENT_TIMESTAMP)
              AND min_purchase <= $2
            RETURNING *;
        "#,
    )
    .bind(code)
    .bind(order_total)
    .fetch_optional(&mut *conn)
    .await?;
    match result {
        Some(voucher) => {
            debug!("🗃️ Voucher {} redeemed ({}/{:?} uses)", voucher.code, voucher.used_count, voucher.max_uses);
            Ok(voucher)
        },
        None => Err(diagnose_redeem_failure(code, order_total, conn).await?.into()),
    }
}

async fn diagnose_redeem_failure(
    code: &str,
    order_total: Rupiah,
    conn: &mut SqliteConnection,
) -> Result<VoucherError, StorefrontError> {
    let voucher = match fetch_voucher(code, conn).await? {
        Some(v) => v,
        None => return Ok(VoucherError::NotFound(code.to_string())),
    };
    let err = if !voucher.is_active {
        VoucherError::Inactive(voucher.code)
    } else if voucher.valid_until.map(|t| t <= Utc::now()).unwrap_or(false) {
        VoucherError::Expired(voucher.code)
    } else if voucher.max_uses.map(|m| voucher.used_count >= m).unwrap_or(false) {
        VoucherError::CapReached(voucher.code)
    } else if voucher.min_purchase > order_total {
        VoucherError::MinPurchaseNotMet { code: voucher.code, min: voucher.min_purchase }
    } else {
        // The guarded update lost a race it should have won; treat it as a cap race.
        VoucherError::CapReached(voucher.code)
    };
    Ok(err)
}

pub async fn insert_voucher(voucher: NewVoucher, conn: &mut SqliteConnection) -> Result<Voucher, StorefrontError> {
    let voucher: Voucher = sqlx::query_as(
        r#"
            INSERT INTO vouchers (code, discount_type, discount_value, min_purchase, max_uses, valid_until)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(voucher.code.to_uppercase())
    .bind(voucher.discount_type)
    .bind(voucher.discount_value)
    .bind(voucher.min_purchase)
    .bind(voucher.max_uses)
    .bind(voucher.valid_until)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Voucher {} created", voucher.code);
    Ok(voucher)
}

pub async fn deactivate_voucher(code: &str, conn: &mut SqliteConnection) -> Result<Voucher, StorefrontError> {
    let result: Option<Voucher> =
        sqlx::query_as("UPDATE vouchers SET is_active = 0 WHERE code = $1 RETURNING *")
            .bind(code)
            .fetch_optional(conn)
            .await?;
    result.ok_or_else(|| VoucherError::NotFound(code.to_string()).into())
}

pub async fn fetch_all_vouchers(conn: &mut SqliteConnection) -> Result<Vec<Voucher>, sqlx::Error> {
    let vouchers = sqlx::query_as("SELECT * FROM vouchers ORDER BY created_at DESC").fetch_all(conn).await?;
    Ok(vouchers)
}
