pub mod analysis;
pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod report;
pub mod server;

use anyhow::{Context, Result};
use clap::Parser;

use analysis::AnalysisService;
use config::{ServerArgs, ServerConfig};
use db::Database;
use server::{Credentials, HttpServer, Router};

/// Entry point for `chemviz-server`.
pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = ServerArgs::parse();
    let config = ServerConfig::resolve(&args)?;

    log::info!("chemviz starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let database = Database::new(config.database_path.clone())?;
    let service = AnalysisService::new(database, config.history_limit);
    let router = Router::new(service, Credentials::from_config(&config)?);
    let server = HttpServer::start(&config, router, runtime.handle().clone())?;

    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("failed to listen for shutdown signal")?;
    log::info!("Shutdown requested");
    server.shutdown();

    Ok(())
}
