//! tapevault-admin - Main entry point
//!
//! Resolves the library location, opens (and migrates) the database, runs a
//! single command and prints its result as JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tapevault_admin::{run, Cli};
use tapevault_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use tapevault_common::db::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = TomlConfig::load_or_default(cli.config.as_deref());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("tapevault_common={level},tapevault_admin={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let root_folder = RootFolderResolver::new("tapevault-admin")
        .with_cli_arg(cli.root_folder.clone())
        .with_config(&config)
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder)
        .with_database_file(config.database_file.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to prepare root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let store = SqliteStore::open(&db_path)
        .await
        .context("Failed to open database")?;

    let output = run(cli.command, store, &config).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
