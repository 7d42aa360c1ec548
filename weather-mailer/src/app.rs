//! Builds the production collaborators from configuration.

use std::{sync::Arc, time::Duration};

use weather_mailer_core::{
    Config, ForecastClient, JsonFileStore, Mailer, NominatimGeocoder, NotificationScheduler,
    SchedulerSettings, SmtpMailer, SubscriberList, WeatherApiProvider,
};

pub fn subscriber_list(config: &Config) -> anyhow::Result<Arc<SubscriberList>> {
    let path = config.subscribers_file()?;
    tracing::debug!(path = %path.display(), "using subscriber file");
    Ok(Arc::new(SubscriberList::new(Arc::new(JsonFileStore::new(path)))))
}

pub fn smtp_mailer(config: &Config) -> anyhow::Result<Arc<SmtpMailer>> {
    let (address, password) = config.require_mail_credentials()?;
    Ok(Arc::new(SmtpMailer::new(&config.mail.smtp_relay, address, password)?))
}

pub fn forecast_client(config: &Config) -> anyhow::Result<ForecastClient> {
    let api_key = config.require_forecast_api_key()?;

    let provider = WeatherApiProvider::new(
        api_key.to_owned(),
        config.forecast.base_url.as_str(),
        Duration::from_secs(config.forecast.request_timeout_secs),
    );
    let geocoder =
        NominatimGeocoder::new(config.geocoding.base_url.as_str(), &config.geocoding.user_agent);

    Ok(ForecastClient::new(Arc::new(provider), Arc::new(geocoder)))
}

pub fn build_scheduler(
    config: &Config,
    mailer: Arc<dyn Mailer>,
) -> anyhow::Result<NotificationScheduler> {
    Ok(NotificationScheduler::new(
        subscriber_list(config)?,
        forecast_client(config)?,
        mailer,
        SchedulerSettings::from_config(&config.schedule),
    ))
}
