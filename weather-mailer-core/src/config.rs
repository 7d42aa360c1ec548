use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

/// WeatherAPI.com settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "http://api.weatherapi.com/v1".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Nominatim reverse-geocoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    pub user_agent: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "WeatherMailer/1.0".to_string(),
        }
    }
}

/// Outbound SMTP account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub address: Option<String>,
    pub app_password: Option<String>,
    pub smtp_relay: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self { address: None, app_password: None, smtp_relay: "smtp.gmail.com".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory with the signup page, served at `/`.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000, static_dir: None }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the default `emails.json` in the platform data dir.
    pub subscribers_file: Option<PathBuf>,
}

/// What happens when a follow-up is requested while another is pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpPolicy {
    /// Every signup arms its own follow-up.
    #[default]
    Stack,
    /// A new follow-up replaces the pending one.
    Replace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub timezone: Tz,
    /// Local `HH:MM` of the daily broadcast.
    pub daily_time: String,
    pub follow_up_hours: u64,
    pub alert_lead_minutes: u64,
    pub follow_up_policy: FollowUpPolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Kathmandu,
            daily_time: "07:15".to_string(),
            follow_up_hours: 3,
            alert_lead_minutes: 10,
            follow_up_policy: FollowUpPolicy::Stack,
        }
    }
}

impl ScheduleConfig {
    pub fn daily_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.daily_time, "%H:%M")
            .with_context(|| format!("Invalid schedule.daily_time '{}', expected HH:MM", self.daily_time))
    }

    /// Six-field cron expression (`sec min hour dom mon dow`) for the daily run.
    pub fn daily_cron(&self) -> Result<String> {
        use chrono::Timelike;
        let t = self.daily_time()?;
        Ok(format!("0 {} {} * * *", t.minute(), t.hour()))
    }

    pub fn follow_up_delay(&self) -> Duration {
        Duration::from_secs(self.follow_up_hours * 60 * 60)
    }

    pub fn alert_lead(&self) -> Duration {
        Duration::from_secs(self.alert_lead_minutes * 60)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [forecast]
/// api_key = "..."
///
/// [mail]
/// address = "me@gmail.com"
/// app_password = "..."
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub forecast: ForecastConfig,
    pub geocoding: GeocodingConfig,
    pub mail: MailConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-mailer", "weather-mailer")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Where the subscriber list lives.
    pub fn subscribers_file(&self) -> Result<PathBuf> {
        match &self.storage.subscribers_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("emails.json")),
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides using the given lookup, so tests don't need to mutate
    /// the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("WEATHERAPI_KEY") {
            self.forecast.api_key = Some(key);
        }
        if let Some(address) = lookup("EMAIL_ADDRESS") {
            self.mail.address = Some(address);
        }
        if let Some(password) = lookup("EMAIL_APP_PASSWORD") {
            self.mail.app_password = Some(password);
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid PORT '{port}', expected a port number"))?;
        }
        if let Some(path) = lookup("SUBSCRIBERS_FILE") {
            self.storage.subscribers_file = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Returns the forecast API key or a hint on how to set it.
    pub fn require_forecast_api_key(&self) -> Result<&str> {
        self.forecast.api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| {
            anyhow!(
                "No WeatherAPI key configured.\n\
                 Hint: run `weather-mailer configure` or set WEATHERAPI_KEY."
            )
        })
    }

    /// Returns `(address, app_password)` or a hint on how to set them.
    pub fn require_mail_credentials(&self) -> Result<(&str, &str)> {
        match (self.mail.address.as_deref(), self.mail.app_password.as_deref()) {
            (Some(address), Some(password)) if !address.is_empty() => Ok((address, password)),
            _ => Err(anyhow!(
                "No mail account configured.\n\
                 Hint: run `weather-mailer configure` or set EMAIL_ADDRESS and EMAIL_APP_PASSWORD."
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_home_region() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.schedule.timezone, chrono_tz::Asia::Kathmandu);
        assert_eq!(cfg.schedule.follow_up_delay(), Duration::from_secs(3 * 3600));
        assert_eq!(cfg.schedule.alert_lead(), Duration::from_secs(600));
        assert_eq!(cfg.schedule.follow_up_policy, FollowUpPolicy::Stack);
    }

    #[test]
    fn daily_cron_is_built_from_local_time() {
        let cfg = ScheduleConfig::default();
        assert_eq!(cfg.daily_cron().unwrap(), "0 15 7 * * *");
    }

    #[test]
    fn bad_daily_time_is_rejected() {
        let cfg = ScheduleConfig { daily_time: "quarter past seven".into(), ..Default::default() };
        let err = cfg.daily_cron().unwrap_err();
        assert!(err.to_string().contains("schedule.daily_time"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = Config::from_toml(
            r#"
            [forecast]
            api_key = "KEY"

            [schedule]
            timezone = "Asia/Kolkata"
            follow_up_policy = "replace"
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.forecast.api_key.as_deref(), Some("KEY"));
        assert_eq!(cfg.forecast.base_url, "http://api.weatherapi.com/v1");
        assert_eq!(cfg.schedule.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(cfg.schedule.daily_time, "07:15");
        assert_eq!(cfg.schedule.follow_up_policy, FollowUpPolicy::Replace);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg = Config::default();
        cfg.forecast.api_key = Some("FILE_KEY".into());

        cfg.apply_overrides(lookup_from(&[
            ("WEATHERAPI_KEY", "ENV_KEY"),
            ("EMAIL_ADDRESS", "sender@example.com"),
            ("EMAIL_APP_PASSWORD", "secret"),
            ("PORT", "8080"),
            ("SUBSCRIBERS_FILE", "/tmp/emails.json"),
        ]))
        .expect("overrides should apply");

        assert_eq!(cfg.require_forecast_api_key().unwrap(), "ENV_KEY");
        assert_eq!(cfg.require_mail_credentials().unwrap(), ("sender@example.com", "secret"));
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.subscribers_file().unwrap(), PathBuf::from("/tmp/emails.json"));
    }

    #[test]
    fn invalid_port_override_names_the_variable() {
        let mut cfg = Config::default();
        let err = cfg.apply_overrides(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn missing_credentials_carry_a_hint() {
        let cfg = Config::default();

        let err = cfg.require_forecast_api_key().unwrap_err();
        assert!(err.to_string().contains("Hint: run `weather-mailer configure`"));

        let err = cfg.require_mail_credentials().unwrap_err();
        assert!(err.to_string().contains("EMAIL_APP_PASSWORD"));
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let mut cfg = Config::default();
        cfg.mail.address = Some("me@example.com".into());
        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let back = Config::from_toml(&text).expect("parse");
        assert_eq!(back.mail.address.as_deref(), Some("me@example.com"));
        assert_eq!(back.schedule.timezone, cfg.schedule.timezone);
    }
}
