use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{
    MethodStat, StatusStat, WithdrawalDetailRow, WithdrawalMethodRow, WithdrawalRow,
    WithdrawalTotalsRow,
};
use crate::domain::{
    BalanceBucket, Withdrawal, WithdrawalDetail, WithdrawalMethod, WithdrawalStatus,
    WithdrawalTotals,
};

// --- Wallet Queries ---

/// Serializes balance-affecting work for one creator and currency. The lock
/// row is created on first use and held until the transaction ends.
pub async fn lock_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    creator_id: Uuid,
    currency: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO wallet_locks (creator_id, currency)
        VALUES ($1, $2)
        ON CONFLICT (creator_id, currency) DO NOTHING
        "#,
    )
    .bind(creator_id)
    .bind(currency)
    .execute(&mut **executor)
    .await?;

    sqlx::query(
        "SELECT creator_id FROM wallet_locks WHERE creator_id = $1 AND currency = $2 FOR UPDATE",
    )
    .bind(creator_id)
    .bind(currency)
    .fetch_one(&mut **executor)
    .await?;

    Ok(())
}

/// Withdrawal sums per currency split into balance buckets. Pass a currency
/// to restrict the result to a single row.
pub async fn withdrawal_totals<'e, E>(
    executor: E,
    creator_id: Uuid,
    currency: Option<&str>,
) -> Result<Vec<WithdrawalTotals>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, WithdrawalTotalsRow>(
        r#"
        SELECT
            currency,
            COALESCE(SUM(amount) FILTER (WHERE status = ANY($3)), 0) AS reserved,
            COALESCE(SUM(amount) FILTER (WHERE status = ANY($4)), 0) AS withdrawn,
            COALESCE(SUM(amount) FILTER (WHERE status = ANY($5)), 0) AS refunded
        FROM withdrawals
        WHERE creator_id = $1
          AND ($2::TEXT IS NULL OR currency = $2)
        GROUP BY currency
        ORDER BY currency
        "#,
    )
    .bind(creator_id)
    .bind(currency)
    .bind(BalanceBucket::Reserved.status_codes())
    .bind(BalanceBucket::Withdrawn.status_codes())
    .bind(BalanceBucket::Refunded.status_codes())
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(WithdrawalTotals::from).collect())
}

// --- Withdrawal Queries ---

pub async fn insert_withdrawal(
    executor: &mut SqlxTransaction<'_, Postgres>,
    withdrawal: &Withdrawal,
) -> Result<Withdrawal> {
    let row = sqlx::query_as::<_, WithdrawalRow>(
        r#"
        INSERT INTO withdrawals (
            id, creator_id, withdrawal_method_id, amount, currency,
            fee_percentage_at_request, processing_fee, net_amount, status, metadata,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(withdrawal.id)
    .bind(withdrawal.creator_id)
    .bind(withdrawal.withdrawal_method_id)
    .bind(&withdrawal.amount)
    .bind(&withdrawal.currency)
    .bind(&withdrawal.fee_percentage_at_request)
    .bind(&withdrawal.processing_fee)
    .bind(&withdrawal.net_amount)
    .bind(withdrawal.status.as_str())
    .bind(&withdrawal.metadata)
    .bind(withdrawal.created_at)
    .bind(withdrawal.updated_at)
    .fetch_one(&mut **executor)
    .await?;

    row.into_domain()
}

pub async fn get_withdrawal_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Withdrawal>> {
    sqlx::query_as::<_, WithdrawalRow>("SELECT * FROM withdrawals WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await?
        .map(WithdrawalRow::into_domain)
        .transpose()
}

/// Persists the status and audit columns of a withdrawal. Money columns are
/// never rewritten after insert.
pub async fn save_withdrawal_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    withdrawal: &Withdrawal,
) -> Result<Withdrawal> {
    let row = sqlx::query_as::<_, WithdrawalRow>(
        r#"
        UPDATE withdrawals
        SET status = $2,
            processed_by = $3,
            processed_at = $4,
            processing_notes = $5,
            rejection_reason = $6,
            gateway_transaction_id = $7,
            gateway_response = $8,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(withdrawal.id)
    .bind(withdrawal.status.as_str())
    .bind(withdrawal.processed_by)
    .bind(withdrawal.processed_at)
    .bind(&withdrawal.processing_notes)
    .bind(&withdrawal.rejection_reason)
    .bind(&withdrawal.gateway_transaction_id)
    .bind(&withdrawal.gateway_response)
    .fetch_one(&mut **executor)
    .await?;

    row.into_domain()
}

/// Fetches one withdrawal with its method joined. With `creator_id` set,
/// rows owned by anyone else are invisible.
pub async fn get_withdrawal_detail(
    pool: &PgPool,
    id: Uuid,
    creator_id: Option<Uuid>,
) -> Result<Option<WithdrawalDetail>> {
    sqlx::query_as::<_, WithdrawalDetailRow>(
        r#"
        SELECT w.*, m.name AS method_name, m.method_type AS method_type
        FROM withdrawals w
        JOIN withdrawal_methods m ON m.id = w.withdrawal_method_id
        WHERE w.id = $1
          AND ($2::UUID IS NULL OR w.creator_id = $2)
        "#,
    )
    .bind(id)
    .bind(creator_id)
    .fetch_optional(pool)
    .await?
    .map(WithdrawalDetailRow::into_domain)
    .transpose()
}

/// Filters for withdrawal listings. Both date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct WithdrawalFilter {
    pub status: Option<WithdrawalStatus>,
    pub method_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

const WITHDRAWAL_FILTER: &str = r#"
    ($1::TEXT IS NULL OR w.status = $1)
    AND ($2::UUID IS NULL OR w.withdrawal_method_id = $2)
    AND ($3::UUID IS NULL OR w.creator_id = $3)
    AND ($4::TIMESTAMPTZ IS NULL OR w.created_at >= $4)
    AND ($5::TIMESTAMPTZ IS NULL OR w.created_at <= $5)
"#;

/// One page of withdrawals, newest first, plus the total matching count.
pub async fn list_withdrawals(
    pool: &PgPool,
    filter: &WithdrawalFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<WithdrawalDetail>, i64)> {
    let status = filter.status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM withdrawals w WHERE {}",
        WITHDRAWAL_FILTER
    ))
    .bind(status)
    .bind(filter.method_id)
    .bind(filter.creator_id)
    .bind(filter.created_from)
    .bind(filter.created_to)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, WithdrawalDetailRow>(&format!(
        r#"
        SELECT w.*, m.name AS method_name, m.method_type AS method_type
        FROM withdrawals w
        JOIN withdrawal_methods m ON m.id = w.withdrawal_method_id
        WHERE {}
        ORDER BY w.created_at DESC, w.id DESC
        LIMIT $6 OFFSET $7
        "#,
        WITHDRAWAL_FILTER
    ))
    .bind(status)
    .bind(filter.method_id)
    .bind(filter.creator_id)
    .bind(filter.created_from)
    .bind(filter.created_to)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let data = rows
        .into_iter()
        .map(WithdrawalDetailRow::into_domain)
        .collect::<Result<Vec<_>>>()?;

    Ok((data, total))
}

// --- Withdrawal Method Queries ---

pub async fn insert_method(pool: &PgPool, method: &WithdrawalMethod) -> Result<WithdrawalMethod> {
    let row = sqlx::query_as::<_, WithdrawalMethodRow>(
        r#"
        INSERT INTO withdrawal_methods (
            id, name, method_type, description, instructions, icon,
            fee_percentage, min_amount, max_amount, currency, supported_currencies,
            processing_time, processing_time_unit, required_fields, display_order,
            is_active, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING *
        "#,
    )
    .bind(method.id)
    .bind(&method.name)
    .bind(method.method_type.as_str())
    .bind(&method.description)
    .bind(&method.instructions)
    .bind(&method.icon)
    .bind(&method.fee_percentage)
    .bind(&method.min_amount)
    .bind(&method.max_amount)
    .bind(&method.currency)
    .bind(&method.supported_currencies)
    .bind(method.processing_time)
    .bind(method.processing_time_unit.as_str())
    .bind(sqlx::types::Json(&method.required_fields))
    .bind(method.display_order)
    .bind(method.is_active)
    .bind(method.created_at)
    .bind(method.updated_at)
    .fetch_one(pool)
    .await?;

    row.into_domain()
}

pub async fn get_method<'e, E>(executor: E, id: Uuid) -> Result<Option<WithdrawalMethod>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, WithdrawalMethodRow>("SELECT * FROM withdrawal_methods WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(WithdrawalMethodRow::into_domain)
        .transpose()
}

/// Overwrites every mutable column. `id` and `created_at` are kept.
pub async fn update_method(pool: &PgPool, method: &WithdrawalMethod) -> Result<WithdrawalMethod> {
    let row = sqlx::query_as::<_, WithdrawalMethodRow>(
        r#"
        UPDATE withdrawal_methods
        SET name = $2,
            method_type = $3,
            description = $4,
            instructions = $5,
            icon = $6,
            fee_percentage = $7,
            min_amount = $8,
            max_amount = $9,
            currency = $10,
            supported_currencies = $11,
            processing_time = $12,
            processing_time_unit = $13,
            required_fields = $14,
            display_order = $15,
            is_active = $16,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(method.id)
    .bind(&method.name)
    .bind(method.method_type.as_str())
    .bind(&method.description)
    .bind(&method.instructions)
    .bind(&method.icon)
    .bind(&method.fee_percentage)
    .bind(&method.min_amount)
    .bind(&method.max_amount)
    .bind(&method.currency)
    .bind(&method.supported_currencies)
    .bind(method.processing_time)
    .bind(method.processing_time_unit.as_str())
    .bind(sqlx::types::Json(&method.required_fields))
    .bind(method.display_order)
    .bind(method.is_active)
    .fetch_one(pool)
    .await?;

    row.into_domain()
}

pub async fn list_methods(pool: &PgPool) -> Result<Vec<WithdrawalMethod>> {
    sqlx::query_as::<_, WithdrawalMethodRow>(
        "SELECT * FROM withdrawal_methods ORDER BY display_order ASC, name ASC",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(WithdrawalMethodRow::into_domain)
    .collect()
}

/// Active methods, optionally restricted to those paying out in `currency`
/// either as primary or supported currency.
pub async fn list_active_methods(
    pool: &PgPool,
    currency: Option<&str>,
) -> Result<Vec<WithdrawalMethod>> {
    sqlx::query_as::<_, WithdrawalMethodRow>(
        r#"
        SELECT * FROM withdrawal_methods
        WHERE is_active = TRUE
          AND ($1::TEXT IS NULL OR currency = $1 OR $1 = ANY(supported_currencies))
        ORDER BY display_order ASC, name ASC
        "#,
    )
    .bind(currency)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(WithdrawalMethodRow::into_domain)
    .collect()
}

/// Locks a method row for the rest of the transaction. Withdrawal inserts
/// that reference it wait on this lock through the foreign key.
pub async fn lock_method(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<bool> {
    let row: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM withdrawal_methods WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **executor)
            .await?;

    Ok(row.is_some())
}

pub async fn method_is_referenced<'e, E>(executor: E, id: Uuid) -> Result<bool>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM withdrawals WHERE withdrawal_method_id = $1)")
        .bind(id)
        .fetch_one(executor)
        .await
}

pub async fn deactivate_method<'e, E>(executor: E, id: Uuid) -> Result<u64>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE withdrawal_methods SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_method<'e, E>(executor: E, id: Uuid) -> Result<u64>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM withdrawal_methods WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

// --- Statistics Queries ---

pub async fn status_stats(pool: &PgPool) -> Result<Vec<StatusStat>> {
    sqlx::query_as::<_, StatusStat>(
        r#"
        SELECT
            status,
            currency,
            COUNT(*) AS count,
            COALESCE(SUM(amount), 0) AS total_amount,
            COALESCE(SUM(processing_fee), 0) AS total_fees
        FROM withdrawals
        GROUP BY status, currency
        ORDER BY status, currency
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn completed_method_stats(pool: &PgPool) -> Result<Vec<MethodStat>> {
    sqlx::query_as::<_, MethodStat>(
        r#"
        SELECT
            m.id AS method_id,
            m.name AS method_name,
            w.currency,
            COUNT(*) AS count,
            COALESCE(SUM(w.amount), 0) AS total_amount,
            COALESCE(SUM(w.processing_fee), 0) AS total_fees
        FROM withdrawals w
        JOIN withdrawal_methods m ON m.id = w.withdrawal_method_id
        WHERE w.status = $1
        GROUP BY m.id, m.name, w.currency
        ORDER BY m.name, w.currency
        "#,
    )
    .bind(WithdrawalStatus::Completed.as_str())
    .fetch_all(pool)
    .await
}

/// Withdrawals still waiting for an admin decision.
pub async fn pending_review_count(pool: &PgPool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM withdrawals WHERE status = ANY($1)")
        .bind(vec![
            WithdrawalStatus::Pending.as_str().to_string(),
            WithdrawalStatus::UnderReview.as_str().to_string(),
        ])
        .fetch_one(pool)
        .await
}
