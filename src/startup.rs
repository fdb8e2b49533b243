use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::time::Duration;

/// Outcome of the preflight checks run by `payout-core config`.
pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub gateway: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn passing() -> Self {
        Self {
            environment: true,
            database: true,
            gateway: true,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, check: Check, error: impl std::fmt::Display) {
        match check {
            Check::Environment => self.environment = false,
            Check::Database => self.database = false,
            Check::Gateway => self.gateway = false,
        }
        self.errors.push(format!("{}: {}", check.label(), error));
    }

    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.gateway
    }

    pub fn print(&self) {
        println!("\nPreflight checks");
        for (check, ok) in [
            (Check::Environment, self.environment),
            (Check::Database, self.database),
            (Check::Gateway, self.gateway),
        ] {
            println!("  {:<16} {}", check.label(), if ok { "ok" } else { "FAILED" });
        }

        for error in &self.errors {
            println!("  - {}", error);
        }

        println!(
            "Result: {}\n",
            if self.is_valid() { "ready to serve" } else { "not ready" }
        );
    }
}

#[derive(Clone, Copy)]
enum Check {
    Environment,
    Database,
    Gateway,
}

impl Check {
    fn label(self) -> &'static str {
        match self {
            Check::Environment => "environment",
            Check::Database => "database",
            Check::Gateway => "payment gateway",
        }
    }
}

pub async fn validate_environment(config: &Config, pool: Option<&PgPool>) -> ValidationReport {
    let mut report = ValidationReport::passing();

    if let Err(e) = validate_env_vars(config) {
        report.fail(Check::Environment, e);
    }

    match pool {
        Some(pool) => {
            if let Err(e) = validate_database(pool).await {
                report.fail(Check::Database, format!("{:#}", e));
            }
        }
        None => report.fail(Check::Database, "could not open a connection pool"),
    }

    if let Some(gateway_url) = &config.payment_gateway_url {
        if let Err(e) = validate_gateway(gateway_url).await {
            report.fail(Check::Gateway, format!("{:#}", e));
        }
    }

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.admin_api_key.len() < 16 {
        anyhow::bail!("ADMIN_API_KEY should be at least 16 characters");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must not be 0");
    }
    if config.payment_gateway_url.is_some() && config.payment_gateway_secret.is_none() {
        anyhow::bail!("PAYMENT_GATEWAY_SECRET is required when PAYMENT_GATEWAY_URL is set");
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("database did not answer")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("migrations table is missing, run `payout-core db migrate`")?;

    if applied == 0 {
        anyhow::bail!("no migrations applied, run `payout-core db migrate`");
    }

    Ok(())
}

/// Only checks that the gateway host answers; any HTTP status counts.
async fn validate_gateway(gateway_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    client
        .get(gateway_url)
        .send()
        .await
        .context("Failed to reach payment gateway")?;

    Ok(())
}
