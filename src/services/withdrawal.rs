use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{MethodStat, StatusStat};
use crate::db::queries::{self, WithdrawalFilter};
use crate::domain::{
    Actor, WalletBalance, Withdrawal, WithdrawalDetail, WithdrawalMethod, WithdrawalStatus,
};
use crate::error::AppError;
use crate::ports::{NotificationSink, PaymentGateway, WithdrawalNotification};
use crate::services::wallet::WalletService;
use crate::validation::{
    sanitize_string, validate_currency_code, validate_max_len, validate_positive_amount,
    REASON_MAX_LEN,
};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub withdrawal_method_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: WithdrawalStatus,
    pub rejection_reason: Option<String>,
    pub processing_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Result<Self, AppError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);

        if page < 1 {
            return Err(AppError::BadRequest("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if (page - 1).checked_mul(limit).is_none() {
            return Err(AppError::BadRequest("page is out of range".to_string()));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, total: i64) -> Self {
        let total_pages = (total + pagination.limit - 1) / pagination.limit;
        Self {
            data,
            pagination: PageInfo {
                page: pagination.page,
                limit: pagination.limit,
                total,
                total_pages,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalStatistics {
    pub by_status: Vec<StatusStat>,
    pub by_method: Vec<MethodStat>,
    pub pending_review_count: i64,
}

/// Runs withdrawal requests and the admin review flow. Every public
/// operation is a single database transaction.
#[derive(Clone)]
pub struct WithdrawalService {
    pool: PgPool,
    wallets: WalletService,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
}

impl WithdrawalService {
    pub fn new(
        pool: PgPool,
        wallets: WalletService,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            pool,
            wallets,
            gateway,
            notifier,
        }
    }

    /// Validates a payout request against the creator's balance and the
    /// method's policy, then records it as `PENDING`.
    pub async fn request_withdrawal(
        &self,
        creator_id: Uuid,
        request: NewWithdrawal,
    ) -> Result<Withdrawal, AppError> {
        validate_positive_amount("amount", &request.amount)?;
        validate_currency_code("currency", &request.currency)?;
        if !request.metadata.is_object() {
            return Err(AppError::Validation(
                "metadata: must be a JSON object".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        queries::lock_wallet(&mut tx, creator_id, &request.currency).await?;

        let balance = self
            .wallets
            .currency_balance(&mut tx, creator_id, &request.currency)
            .await?;
        let balance = ensure_has_earnings(balance, &request.currency)?;

        let method = queries::get_method(&mut *tx, request.withdrawal_method_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Withdrawal method {} not found or inactive",
                    request.withdrawal_method_id
                ))
            })?;

        ensure_method_accepts(&method, &request.currency, &request.amount)?;
        ensure_sufficient_balance(&balance, &request.amount)?;
        method.validate_metadata(&request.metadata)?;

        let withdrawal = Withdrawal::new_pending(
            creator_id,
            &method,
            request.amount,
            request.currency,
            request.metadata,
        );
        let saved = queries::insert_withdrawal(&mut tx, &withdrawal).await?;
        tx.commit().await?;

        tracing::info!(
            withdrawal_id = %saved.id,
            creator_id = %creator_id,
            method_id = %method.id,
            amount = %saved.amount,
            fee = %saved.processing_fee,
            currency = %saved.currency,
            "Withdrawal requested"
        );

        Ok(saved)
    }

    /// Admin-driven transition. Completing a withdrawal pays it out through
    /// the gateway before the new status is committed.
    pub async fn update_status(
        &self,
        withdrawal_id: Uuid,
        admin_id: Uuid,
        change: StatusChange,
    ) -> Result<Withdrawal, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut withdrawal = queries::get_withdrawal_for_update(&mut tx, withdrawal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Withdrawal {} not found", withdrawal_id)))?;
        let previous = withdrawal.status;

        apply_admin_transition(&mut withdrawal, admin_id, change, Utc::now())?;

        if withdrawal.status.reserves_funds_from(previous) {
            queries::lock_wallet(&mut tx, withdrawal.creator_id, &withdrawal.currency).await?;
            let balance = self
                .wallets
                .currency_balance(&mut tx, withdrawal.creator_id, &withdrawal.currency)
                .await?
                .ok_or_else(|| AppError::NoEarnings {
                    currency: withdrawal.currency.clone(),
                })?;
            ensure_sufficient_balance(&balance, &withdrawal.amount)?;
        }

        if withdrawal.status == WithdrawalStatus::Completed {
            let method = queries::get_method(&mut *tx, withdrawal.withdrawal_method_id)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "Withdrawal method {} missing for withdrawal {}",
                        withdrawal.withdrawal_method_id, withdrawal.id
                    ))
                })?;

            match self.gateway.attempt_payout(&withdrawal, &method).await {
                Ok(receipt) => {
                    withdrawal.gateway_transaction_id = Some(receipt.gateway_transaction_id);
                    withdrawal.gateway_response = Some(receipt.gateway_response);
                }
                Err(e) => {
                    tx.rollback().await?;
                    tracing::warn!(
                        withdrawal_id = %withdrawal.id,
                        error = %e,
                        "Payout failed, withdrawal left unchanged"
                    );
                    return Err(e.into());
                }
            }
        }

        let saved = queries::save_withdrawal_status(&mut tx, &withdrawal).await?;
        tx.commit().await?;

        tracing::info!(
            withdrawal_id = %saved.id,
            admin_id = %admin_id,
            from = %previous,
            to = %saved.status,
            "Withdrawal status updated"
        );

        self.notify_if_terminal(&saved).await;
        Ok(saved)
    }

    /// Creator withdraws their own request before review starts. Requests
    /// owned by another creator are reported as missing.
    pub async fn cancel_withdrawal(
        &self,
        creator_id: Uuid,
        withdrawal_id: Uuid,
    ) -> Result<Withdrawal, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut withdrawal = queries::get_withdrawal_for_update(&mut tx, withdrawal_id)
            .await?
            .filter(|w| w.creator_id == creator_id)
            .ok_or_else(|| AppError::NotFound(format!("Withdrawal {} not found", withdrawal_id)))?;

        ensure_transition(&withdrawal, WithdrawalStatus::Cancelled, Actor::Creator)?;
        withdrawal.status = WithdrawalStatus::Cancelled;

        let saved = queries::save_withdrawal_status(&mut tx, &withdrawal).await?;
        tx.commit().await?;

        tracing::info!(
            withdrawal_id = %saved.id,
            creator_id = %creator_id,
            "Withdrawal cancelled by creator"
        );

        self.notify_if_terminal(&saved).await;
        Ok(saved)
    }

    pub async fn list_withdrawals(
        &self,
        filter: &WithdrawalFilter,
        pagination: Pagination,
    ) -> Result<Paginated<WithdrawalDetail>, AppError> {
        let (data, total) = queries::list_withdrawals(
            &self.pool,
            filter,
            pagination.limit,
            pagination.offset(),
        )
        .await?;

        Ok(Paginated::new(data, pagination, total))
    }

    /// With `creator_id` set, only that creator's withdrawal is visible.
    pub async fn get_withdrawal(
        &self,
        withdrawal_id: Uuid,
        creator_id: Option<Uuid>,
    ) -> Result<WithdrawalDetail, AppError> {
        queries::get_withdrawal_detail(&self.pool, withdrawal_id, creator_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Withdrawal {} not found", withdrawal_id)))
    }

    pub async fn statistics(&self) -> Result<WithdrawalStatistics, AppError> {
        let by_status = queries::status_stats(&self.pool).await?;
        let by_method = queries::completed_method_stats(&self.pool).await?;
        let pending_review_count = queries::pending_review_count(&self.pool).await?;

        Ok(WithdrawalStatistics {
            by_status,
            by_method,
            pending_review_count,
        })
    }

    async fn notify_if_terminal(&self, withdrawal: &Withdrawal) {
        if !withdrawal.status.is_terminal() {
            return;
        }

        let notification = WithdrawalNotification::from(withdrawal);
        if let Err(e) = self.notifier.notify(&notification).await {
            tracing::warn!(
                withdrawal_id = %withdrawal.id,
                status = %withdrawal.status,
                error = %e,
                "Failed to deliver withdrawal notification"
            );
        }
    }
}

pub fn ensure_has_earnings(
    balance: Option<WalletBalance>,
    currency: &str,
) -> Result<WalletBalance, AppError> {
    match balance {
        Some(balance) if balance.has_funds() => Ok(balance),
        _ => Err(AppError::NoEarnings {
            currency: currency.to_string(),
        }),
    }
}

pub fn ensure_method_accepts(
    method: &WithdrawalMethod,
    currency: &str,
    amount: &BigDecimal,
) -> Result<(), AppError> {
    if !method.supports_currency(currency) {
        return Err(AppError::Validation(format!(
            "currency: {} does not pay out in {}",
            method.name, currency
        )));
    }

    if !method.within_limits(amount) {
        return Err(AppError::AmountOutOfRange {
            method: method.name.clone(),
            currency: currency.to_string(),
            min: method.min_amount.clone(),
            max: method.max_amount.clone(),
            requested: amount.clone(),
        });
    }

    Ok(())
}

pub fn ensure_sufficient_balance(
    balance: &WalletBalance,
    amount: &BigDecimal,
) -> Result<(), AppError> {
    if amount > &balance.available_balance {
        return Err(AppError::InsufficientBalance {
            currency: balance.currency.clone(),
            available: balance.available_balance.clone(),
            requested: amount.with_scale(2),
        });
    }

    Ok(())
}

fn ensure_transition(
    withdrawal: &Withdrawal,
    next: WithdrawalStatus,
    actor: Actor,
) -> Result<(), AppError> {
    if !withdrawal.status.can_transition_to(next, actor) {
        return Err(AppError::InvalidTransition {
            from: withdrawal.status,
            to: next,
        });
    }

    Ok(())
}

/// Checks an admin status change against the transition table and stamps
/// the audit columns. The row is only mutated when the change is allowed.
pub fn apply_admin_transition(
    withdrawal: &mut Withdrawal,
    admin_id: Uuid,
    change: StatusChange,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    ensure_transition(withdrawal, change.status, Actor::Admin)?;

    let reason = change
        .rejection_reason
        .map(|r| sanitize_string(&r))
        .filter(|r| !r.is_empty());
    let notes = change
        .processing_notes
        .map(|n| sanitize_string(&n))
        .filter(|n| !n.is_empty());

    if let Some(reason) = &reason {
        validate_max_len("rejection_reason", reason, REASON_MAX_LEN)?;
    }
    if let Some(notes) = &notes {
        validate_max_len("processing_notes", notes, REASON_MAX_LEN)?;
    }

    if change.status == WithdrawalStatus::Rejected {
        match reason {
            Some(reason) => withdrawal.rejection_reason = Some(reason),
            None => {
                return Err(AppError::Validation(
                    "rejection_reason: is required when rejecting a withdrawal".to_string(),
                ))
            }
        }
    }

    if notes.is_some() {
        withdrawal.processing_notes = notes;
    }

    withdrawal.status = change.status;
    withdrawal.processed_by = Some(admin_id);
    withdrawal.processed_at = Some(now);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurrencyEarnings, MethodType, ProcessingTimeUnit, WithdrawalTotals};
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn method() -> WithdrawalMethod {
        WithdrawalMethod {
            id: Uuid::new_v4(),
            name: "Instapay".to_string(),
            method_type: MethodType::Instapay,
            description: None,
            instructions: None,
            icon: None,
            fee_percentage: dec("2.00"),
            min_amount: dec("100.00"),
            max_amount: dec("5000.00"),
            currency: "EGP".to_string(),
            supported_currencies: vec!["EGP".to_string()],
            processing_time: 1,
            processing_time_unit: ProcessingTimeUnit::BusinessDays,
            required_fields: vec![],
            display_order: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn balance(earned: &str, reserved: &str, withdrawn: &str) -> WalletBalance {
        WalletBalance::from_parts(
            &CurrencyEarnings {
                currency: "EGP".to_string(),
                total_earnings: dec(earned),
            },
            &WithdrawalTotals {
                currency: "EGP".to_string(),
                reserved: dec(reserved),
                withdrawn: dec(withdrawn),
                refunded: dec("0"),
            },
        )
    }

    fn pending() -> Withdrawal {
        Withdrawal::new_pending(
            Uuid::new_v4(),
            &method(),
            dec("500.00"),
            "EGP".to_string(),
            json!({}),
        )
    }

    fn change(status: WithdrawalStatus) -> StatusChange {
        StatusChange {
            status,
            rejection_reason: None,
            processing_notes: None,
        }
    }

    #[test]
    fn missing_or_empty_wallet_reports_no_earnings() {
        let err = ensure_has_earnings(None, "USD").unwrap_err();
        assert_eq!(err.error_code(), "NO_EARNINGS");

        let drained = balance("100", "60", "40");
        let err = ensure_has_earnings(Some(drained), "EGP").unwrap_err();
        assert_eq!(err.error_code(), "NO_EARNINGS");

        assert!(ensure_has_earnings(Some(balance("100", "0", "0")), "EGP").is_ok());
    }

    #[test]
    fn method_limits_are_inclusive() {
        let m = method();
        assert!(ensure_method_accepts(&m, "EGP", &dec("100")).is_ok());
        assert!(ensure_method_accepts(&m, "EGP", &dec("5000")).is_ok());

        let err = ensure_method_accepts(&m, "EGP", &dec("50")).unwrap_err();
        assert_eq!(err.error_code(), "AMOUNT_OUT_OF_RANGE");
        let err = ensure_method_accepts(&m, "EGP", &dec("5000.01")).unwrap_err();
        assert_eq!(err.error_code(), "AMOUNT_OUT_OF_RANGE");
    }

    #[test]
    fn unsupported_currency_is_a_validation_error() {
        let err = ensure_method_accepts(&method(), "USD", &dec("200")).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("Instapay"));
        assert!(err.to_string().contains("USD"));
    }

    #[test]
    fn balance_check_reports_both_figures() {
        let b = balance("1000", "500", "0");
        assert!(ensure_sufficient_balance(&b, &dec("500")).is_ok());

        let err = ensure_sufficient_balance(&b, &dec("600")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient balance: available 500.00 EGP, requested 600.00 EGP"
        );
    }

    #[test]
    fn admin_transition_stamps_audit_fields() {
        let mut w = pending();
        let admin = Uuid::new_v4();
        let now = Utc::now();

        apply_admin_transition(&mut w, admin, change(WithdrawalStatus::UnderReview), now).unwrap();
        assert_eq!(w.status, WithdrawalStatus::UnderReview);
        assert_eq!(w.processed_by, Some(admin));
        assert_eq!(w.processed_at, Some(now));
    }

    #[test]
    fn invalid_transition_leaves_row_untouched() {
        let mut w = pending();
        w.status = WithdrawalStatus::Completed;

        let err = apply_admin_transition(
            &mut w,
            Uuid::new_v4(),
            change(WithdrawalStatus::Pending),
            Utc::now(),
        )
        .unwrap_err();

        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert_eq!(w.status, WithdrawalStatus::Completed);
        assert!(w.processed_by.is_none());
    }

    #[test]
    fn rejection_requires_reason() {
        let mut w = pending();
        let err = apply_admin_transition(
            &mut w,
            Uuid::new_v4(),
            StatusChange {
                status: WithdrawalStatus::Rejected,
                rejection_reason: Some("   ".to_string()),
                processing_notes: None,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(w.status, WithdrawalStatus::Pending);

        apply_admin_transition(
            &mut w,
            Uuid::new_v4(),
            StatusChange {
                status: WithdrawalStatus::Rejected,
                rejection_reason: Some("  Account\tname mismatch ".to_string()),
                processing_notes: Some("checked twice".to_string()),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(w.status, WithdrawalStatus::Rejected);
        assert_eq!(w.rejection_reason.as_deref(), Some("Account name mismatch"));
        assert_eq!(w.processing_notes.as_deref(), Some("checked twice"));
    }

    #[test]
    fn creator_can_only_cancel_pending() {
        let mut w = pending();
        assert!(ensure_transition(&w, WithdrawalStatus::Cancelled, Actor::Creator).is_ok());

        w.status = WithdrawalStatus::UnderReview;
        let err = ensure_transition(&w, WithdrawalStatus::Cancelled, Actor::Creator).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        let p = Pagination::new(None, None).unwrap();
        assert_eq!(p, Pagination::default());
        assert_eq!(p.offset(), 0);

        let p = Pagination::new(Some(3), Some(20)).unwrap();
        assert_eq!(p.offset(), 40);

        assert!(Pagination::new(Some(0), None).is_err());
        assert!(Pagination::new(None, Some(0)).is_err());
        assert!(Pagination::new(None, Some(101)).is_err());
    }

    #[test]
    fn pagination_rejects_pages_past_the_offset_range() {
        let err = Pagination::new(Some(i64::MAX), Some(10)).unwrap_err();
        assert_eq!(err.error_code(), "BAD_REQUEST");

        let last = i64::MAX / MAX_PAGE_SIZE + 1;
        let p = Pagination::new(Some(last), Some(MAX_PAGE_SIZE)).unwrap();
        assert_eq!(p.offset(), (last - 1) * MAX_PAGE_SIZE);
        assert!(Pagination::new(Some(last + 1), Some(MAX_PAGE_SIZE)).is_err());

        let p = Pagination::new(Some(i64::MAX), Some(1)).unwrap();
        assert_eq!(p.offset(), i64::MAX - 1);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = Paginated::new(vec![1, 2], Pagination { page: 1, limit: 10 }, 21);
        assert_eq!(page.pagination.total_pages, 3);

        let empty: Paginated<i32> = Paginated::new(vec![], Pagination::default(), 0);
        assert_eq!(empty.pagination.total_pages, 0);
    }
}
