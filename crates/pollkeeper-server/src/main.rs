use anyhow::{Context, Result};
use clap::Parser;
use pollkeeper_db::{Database, RequestContext};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    let filter = match args.log_level.as_deref() {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("pollkeeper=info,sqlx=warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::load(&args.config)?;
    ensure_database_dir(&config.database.url);

    let timeout = config.request.timeout();
    let db = Database::open(&RequestContext::with_timeout(timeout), &config.database)
        .await
        .context("failed init database")?;

    // Ctrl-C abandons the running command instead of letting it finish stale work.
    let ctx = RequestContext::with_timeout(timeout);
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down...");
            interrupt.cancel();
        }
    });

    let result = commands::execute(&db, &ctx, args.command).await;
    db.close().await;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// SQLite creates the file but not its parent directory.
fn ensure_database_dir(url: &str) {
    if let Some(db_path) = url
        .strip_prefix("sqlite://")
        .and_then(|s| s.split('?').next())
    {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!("Could not create directory '{}': {}", parent.display(), e);
                }
            }
        }
    }
}
