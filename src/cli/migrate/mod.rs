//! Migrate command - applies or reverts the PostgreSQL schema

use clap::Args;
use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::logging;
use crate::infrastructure::storage::{connect_pool, Migrator, PostgresConfig, PostgresMigrator};

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Database URL; defaults to `storage.database_url` or `DATABASE_URL`
    #[arg(long)]
    pub database_url: Option<String>,

    /// Revert the most recently applied migration instead of applying
    #[arg(long)]
    pub revert: bool,
}

pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging_config())?;

    let url = args
        .database_url
        .or_else(|| config.storage.database_url.clone())
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("No database URL: pass --database-url or set DATABASE_URL"))?;

    let pool = connect_pool(&PostgresConfig::new(url)).await?;
    let migrator = PostgresMigrator::new(pool);

    if args.revert {
        match migrator.revert().await? {
            Some(version) => info!(version, "Reverted migration"),
            None => info!("No migration to revert"),
        }
    } else {
        let applied = migrator.run().await?;
        info!(applied, "Migrations applied");
    }

    info!(version = ?migrator.version().await?, "Schema version");
    Ok(())
}
