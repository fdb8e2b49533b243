//! Postgres implementation of EarningsSource over the checkout flow's
//! `creator_sales` table.

use async_trait::async_trait;
use sqlx::types::BigDecimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::domain::CurrencyEarnings;
use crate::ports::{EarningsError, EarningsSource};

#[derive(Clone)]
pub struct PostgresEarningsSource {
    pool: PgPool,
}

impl PostgresEarningsSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct EarningsRow {
    currency: String,
    total_earnings: BigDecimal,
}

#[async_trait]
impl EarningsSource for PostgresEarningsSource {
    async fn creator_earnings(
        &self,
        creator_id: Uuid,
    ) -> Result<Vec<CurrencyEarnings>, EarningsError> {
        let rows = sqlx::query_as::<_, EarningsRow>(
            r#"
            SELECT currency, COALESCE(SUM(creator_amount), 0) AS total_earnings
            FROM creator_sales
            WHERE creator_id = $1 AND status = 'COMPLETED'
            GROUP BY currency
            ORDER BY currency
            "#,
        )
        .bind(creator_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CurrencyEarnings {
                currency: r.currency,
                total_earnings: r.total_earnings,
            })
            .collect())
    }
}
