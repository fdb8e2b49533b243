use clap::{Parser, Subcommand};
use std::str::FromStr;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::WithdrawalStatus;
use crate::services::withdrawal::StatusChange;
use crate::AppState;

#[derive(Parser)]
#[command(name = "payout-core")]
#[command(about = "Payout Core - creator wallet and withdrawal ledger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Print the effective configuration and run startup checks
    Config,

    /// Wallet inspection
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Withdrawal administration
    #[command(subcommand)]
    Withdrawal(WithdrawalCommands),

    /// Withdrawal method administration
    #[command(subcommand)]
    Method(MethodCommands),
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Show a creator's balances per currency
    Show {
        #[arg(value_name = "CREATOR_ID")]
        creator_id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum WithdrawalCommands {
    /// Move a withdrawal to a new status as an admin
    SetStatus {
        #[arg(value_name = "WITHDRAWAL_ID")]
        withdrawal_id: Uuid,

        /// Target status, e.g. UNDER_REVIEW, COMPLETED, REJECTED
        #[arg(value_name = "STATUS")]
        status: String,

        /// Admin user recorded as processor
        #[arg(long)]
        admin: Uuid,

        /// Rejection reason (required for REJECTED)
        #[arg(long)]
        reason: Option<String>,

        /// Free-form processing notes
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MethodCommands {
    /// List every withdrawal method, including inactive ones
    List,
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", config.database_url_masked());
    println!("  Database Max Connections: {}", config.database_max_connections);
    println!(
        "  Payment Gateway: {}",
        config.payment_gateway_url.as_deref().unwrap_or("manual")
    );
    println!(
        "  Notification Webhook: {}",
        config.notification_webhook_url.as_deref().unwrap_or("log only")
    );
    println!("  Log Format: {:?}", config.log_format);

    let pool = crate::db::create_pool(config).await.ok();
    let report = crate::startup::validate_environment(config, pool.as_ref()).await;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("Configuration validation failed");
    }
    Ok(())
}

pub async fn handle_wallet_show(state: &AppState, creator_id: Uuid) -> anyhow::Result<()> {
    let balances = state.wallets.get_wallet(creator_id).await?;

    if balances.is_empty() {
        println!("Creator {} has no earnings", creator_id);
        return Ok(());
    }

    println!(
        "{:<8} {:>14} {:>14} {:>14} {:>14} {:>14}",
        "Currency", "Earned", "Available", "Pending", "Withdrawn", "Refunded"
    );
    println!("{}", "-".repeat(83));
    for b in balances {
        println!(
            "{:<8} {:>14} {:>14} {:>14} {:>14} {:>14}",
            b.currency,
            b.total_earnings,
            b.available_balance,
            b.pending_withdrawals,
            b.total_withdrawn,
            b.refunded_amount
        );
    }

    Ok(())
}

pub async fn handle_withdrawal_set_status(
    state: &AppState,
    withdrawal_id: Uuid,
    status: &str,
    admin: Uuid,
    reason: Option<String>,
    notes: Option<String>,
) -> anyhow::Result<()> {
    let status = WithdrawalStatus::from_str(status)
        .map_err(|_| anyhow::anyhow!("Unknown status '{}'", status))?;

    let withdrawal = state
        .withdrawals
        .update_status(
            withdrawal_id,
            admin,
            StatusChange {
                status,
                rejection_reason: reason,
                processing_notes: notes,
            },
        )
        .await?;

    println!(
        "✓ Withdrawal {} is now {}",
        withdrawal.id, withdrawal.status
    );
    Ok(())
}

pub async fn handle_method_list(state: &AppState) -> anyhow::Result<()> {
    let methods = state.methods.list_all().await?;

    if methods.is_empty() {
        println!("No withdrawal methods configured");
        return Ok(());
    }

    println!(
        "{:<38} {:<24} {:<14} {:>7} {:>12} {:>12} {:<8} {:<6}",
        "ID", "Name", "Type", "Fee %", "Min", "Max", "Currency", "Active"
    );
    println!("{}", "-".repeat(128));
    for m in methods {
        println!(
            "{:<38} {:<24} {:<14} {:>7} {:>12} {:>12} {:<8} {:<6}",
            m.id,
            m.name,
            m.method_type.as_str(),
            m.fee_percentage,
            m.min_amount,
            m.max_amount,
            m.supported_currencies.join(","),
            if m.is_active { "yes" } else { "no" }
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_set_status() {
        let id = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let id_arg = id.to_string();
        let admin_arg = admin.to_string();
        let cli = Cli::try_parse_from([
            "payout-core",
            "withdrawal",
            "set-status",
            id_arg.as_str(),
            "REJECTED",
            "--admin",
            admin_arg.as_str(),
            "--reason",
            "IBAN mismatch",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Withdrawal(WithdrawalCommands::SetStatus {
                withdrawal_id,
                status,
                admin: parsed_admin,
                reason,
                notes,
            })) => {
                assert_eq!(withdrawal_id, id);
                assert_eq!(status, "REJECTED");
                assert_eq!(parsed_admin, admin);
                assert_eq!(reason.as_deref(), Some("IBAN mismatch"));
                assert!(notes.is_none());
            }
            _ => panic!("expected withdrawal set-status"),
        }
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["payout-core"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_wallet_show_requires_uuid() {
        assert!(Cli::try_parse_from(["payout-core", "wallet", "show", "not-a-uuid"]).is_err());
    }
}
