use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, Text};
use std::sync::Arc;

use weather_mailer_core::{
    BroadcastKind, Config,
    model::{DEFAULT_LAT, DEFAULT_LON},
};

use crate::{app, server};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-mailer", version, about = "Subscription weather mailer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the signup API and the daily broadcast.
    Serve,

    /// Send one broadcast to every subscriber and exit.
    SendNow {
        #[arg(long, default_value_t = DEFAULT_LAT, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, default_value_t = DEFAULT_LON, allow_negative_numbers = true)]
        lon: f64,

        /// Send as a follow-up update instead of the daily one.
        #[arg(long)]
        follow_up: bool,
    },

    /// Print the stored subscriber list.
    Subscribers,

    /// Interactively set the forecast API key and mail account.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve => {
                let config = load_config()?;
                server::serve(&config).await
            }
            Command::SendNow { lat, lon, follow_up } => {
                let config = load_config()?;
                let mailer = app::smtp_mailer(&config)?;
                let scheduler = Arc::new(app::build_scheduler(&config, mailer)?);

                let kind = if follow_up { BroadcastKind::FollowUp } else { BroadcastKind::Regular };
                let report = scheduler.send_now(lat, lon, kind).await;
                println!("Broadcast result: {report:?}");

                if scheduler.pending_timers() > 0 {
                    tracing::warn!("process is exiting, pending heavy-rain alert will not be sent");
                    scheduler.shutdown();
                }
                Ok(())
            }
            Command::Subscribers => {
                let config = load_config()?;
                let list = app::subscriber_list(&config)?.load().await?;
                if list.is_empty() {
                    println!("No subscribers yet.");
                }
                for email in list {
                    println!("{email}");
                }
                Ok(())
            }
            Command::Configure => configure(),
        }
    }
}

fn load_config() -> anyhow::Result<Config> {
    let mut config = Config::load()?;
    config.apply_env()?;
    Ok(config)
}

/// Prompt for credentials and store them in the config file. Environment
/// overrides are not applied here so they never get persisted.
fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Text::new("WeatherAPI.com API key:")
        .with_default(config.forecast.api_key.as_deref().unwrap_or_default())
        .prompt()
        .context("Failed to read API key")?;

    let address = Text::new("Sender email address:")
        .with_default(config.mail.address.as_deref().unwrap_or_default())
        .prompt()
        .context("Failed to read sender address")?;

    let password = Password::new("Mail app password:")
        .without_confirmation()
        .prompt()
        .context("Failed to read app password")?;

    config.forecast.api_key = Some(api_key.trim().to_string()).filter(|k| !k.is_empty());
    config.mail.address = Some(address.trim().to_string()).filter(|a| !a.is_empty());
    if !password.is_empty() {
        config.mail.app_password = Some(password);
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}
