//! CLI module for Inventory Tracker
//!
//! - `serve`: run the HTTP API
//! - `migrate`: apply or revert PostgreSQL schema migrations

pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

/// Inventory Tracker - order and inventory REST backend with a cache-aside read path
#[derive(Parser)]
#[command(name = "inventory-tracker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Apply pending PostgreSQL migrations
    Migrate(migrate::MigrateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["inventory-tracker", "serve"]).unwrap();
        assert!(matches!(cli.command, Command::Serve));
    }

    #[test]
    fn test_parse_migrate_revert() {
        let cli = Cli::try_parse_from([
            "inventory-tracker",
            "migrate",
            "--database-url",
            "postgres://localhost/test",
            "--revert",
        ])
        .unwrap();

        match cli.command {
            Command::Migrate(args) => {
                assert!(args.revert);
                assert_eq!(args.database_url.as_deref(), Some("postgres://localhost/test"));
            }
            Command::Serve => panic!("expected migrate"),
        }
    }
}
