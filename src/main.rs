mod broadcast;
mod callbacks;
mod commands;
mod config;
mod db;
mod errors;
mod handlers;
mod keyboards;
mod migrations;
mod schema;
mod session;
mod settings;
mod state;
mod subscription;
mod temp_file;
mod utils;
mod video;

use std::sync::Arc;

use teloxide::prelude::*;
use tokio::fs;

use crate::{config::Config, errors::BotResult, schema::schema, state::AppState, utils::clear_dir};

#[tokio::main]
async fn main() -> BotResult<()> {
    let _ = dotenvy::dotenv();
    pretty_env_logger::init();
    log::info!("Starting download bot...");

    let config = Config::from_env()?;
    clear_dir(&config.scratch_dir).await?;
    fs::create_dir_all(&config.export_dir).await?;

    let state = AppState::init(config).await?;
    log::info!(
        "Store and settings ready, {} admins configured",
        state.config.admin_ids.len()
    );
    let state = Arc::new(state);

    let bot = Bot::from_env();

    // one update at a time, in arrival order
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state.clone()])
        .distribution_function(|_| Some(()))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Shutting down");
    clear_dir(state.fetcher.scratch_dir()).await?;
    Ok(())
}
