//! Binary crate for the `weather-mailer` service.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - The HTTP signup API and the daily broadcast trigger

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod jobs;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
