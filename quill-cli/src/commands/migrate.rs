//! Create the users and posts tables, then exit

use anyhow::{Context, Result};
use clap::Parser;

use quill_server::run_migrations;

use super::DatabaseArgs;

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub db: DatabaseArgs,
}

pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let pool = args.db.connect().await?;
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    pool.close().await;
    Ok(())
}
