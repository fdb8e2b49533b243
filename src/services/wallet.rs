use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::queries;
use crate::domain::wallet::compose_wallet;
use crate::domain::{WalletBalance, WithdrawalTotals};
use crate::error::AppError;
use crate::ports::EarningsSource;

/// Derives wallet balances from earnings and withdrawal history. Nothing is
/// cached, every call reads current state.
#[derive(Clone)]
pub struct WalletService {
    pool: PgPool,
    earnings: Arc<dyn EarningsSource>,
}

impl WalletService {
    pub fn new(pool: PgPool, earnings: Arc<dyn EarningsSource>) -> Self {
        Self { pool, earnings }
    }

    /// One entry per currency the creator has earned in, sorted by currency.
    pub async fn get_wallet(&self, creator_id: Uuid) -> Result<Vec<WalletBalance>, AppError> {
        let earnings = self.earnings.creator_earnings(creator_id).await?;
        if earnings.is_empty() {
            return Ok(Vec::new());
        }

        let totals = queries::withdrawal_totals(&self.pool, creator_id, None).await?;
        Ok(compose_wallet(earnings, totals))
    }

    /// Balance in a single currency, read through `tx` so callers holding
    /// the wallet lock see a consistent view. `None` means no earnings in
    /// that currency.
    pub async fn currency_balance(
        &self,
        tx: &mut SqlxTransaction<'_, Postgres>,
        creator_id: Uuid,
        currency: &str,
    ) -> Result<Option<WalletBalance>, AppError> {
        let earnings = self.earnings.creator_earnings(creator_id).await?;
        let Some(earned) = earnings.into_iter().find(|e| e.currency == currency) else {
            return Ok(None);
        };

        let totals = queries::withdrawal_totals(&mut **tx, creator_id, Some(currency))
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| WithdrawalTotals::empty(currency));

        Ok(Some(WalletBalance::from_parts(&earned, &totals)))
    }
}
