use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payout_core::cli::{
    self, Cli, Commands, DbCommands, MethodCommands, WalletCommands, WithdrawalCommands,
};
use payout_core::config::{Config, LogFormat};
use payout_core::{create_app_with_cors, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config).await,
        Commands::Wallet(WalletCommands::Show { creator_id }) => {
            let state = connect(&config).await?;
            cli::handle_wallet_show(&state, creator_id).await
        }
        Commands::Withdrawal(WithdrawalCommands::SetStatus {
            withdrawal_id,
            status,
            admin,
            reason,
            notes,
        }) => {
            let state = connect(&config).await?;
            cli::handle_withdrawal_set_status(&state, withdrawal_id, &status, admin, reason, notes)
                .await
        }
        Commands::Method(MethodCommands::List) => {
            let state = connect(&config).await?;
            cli::handle_method_list(&state).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn connect(config: &Config) -> anyhow::Result<AppState> {
    let pool = db::create_pool(config).await?;
    Ok(AppState::from_config(config, pool))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    tracing::info!(database = %config.database_url_masked(), "Database pool created");

    db::run_migrations(&pool).await?;

    let state = AppState::from_config(&config, pool);
    let app = create_app_with_cors(state, &config.cors_allowed_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
