//! Token ledger server binary

use token_ledger::{Config, TokenLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting token ledger server");

    // Environment overrides on top of defaults
    let config = Config::from_env()?;
    tracing::info!(data_dir = %config.data_dir.display(), "Configuration loaded");

    let ledger = TokenLedger::open(config).await?;

    let stats = ledger.stats()?;
    tracing::info!(
        transactions = stats.total_transactions,
        wallets = stats.total_wallets,
        audit_entries = stats.total_audit_entries,
        "Ledger opened"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down token ledger server");
    ledger.shutdown().await?;
    Ok(())
}
