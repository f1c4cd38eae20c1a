use std::sync::Arc;

use anyhow::Context;

mod api;
mod config;
mod db;
mod models;
mod password;
mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env()?;
    let storage = db::Storage::connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    storage.migrate().await.context("failed to apply migrations")?;

    api::run(&config.bind_address, Arc::new(storage))
        .await
        .context("server error")?;
    Ok(())
}
