//! Chronicle operations CLI entry point.

use std::error::Error;

use chronicle_admin::{Admin, AdminConfig, Cli};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    // Read configuration from environment.
    let config = AdminConfig::from_env()?;

    // Create database connection pool.
    let pool = config.connect().await?;

    tracing::info!(command = ?cli.command, "running admin command");

    let admin = Admin::postgres(&pool);
    admin.execute(&cli.command, &mut std::io::stdout()).await?;

    pool.close().await;
    Ok(())
}
