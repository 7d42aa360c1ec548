//! Core library for the weather mailer.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Forecast and reverse-geocoding providers, normalized into snapshots
//! - Bilingual (English/Nepali) message composition
//! - Subscriber persistence and outbound mail
//! - The notification scheduler: broadcasts, follow-ups and heavy-rain alerts
//!
//! It is used by the `weather-mailer` binary, which adds the HTTP API and the
//! daily trigger.

pub mod compose;
pub mod config;
pub mod error;
pub mod forecast;
pub mod mailer;
pub mod model;
pub mod provider;
pub mod scheduler;
pub mod store;
pub mod timer;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{Config, FollowUpPolicy};
pub use error::{Error, MailError, PersistenceError, ProviderError, ValidationError};
pub use forecast::ForecastClient;
pub use mailer::{Mailer, OutgoingEmail, SmtpMailer};
pub use model::{BroadcastKind, Coordinates, ForecastSnapshot, HeavyRainHour};
pub use provider::{ForecastProvider, Geocoder, NominatimGeocoder, WeatherApiProvider};
pub use scheduler::{BroadcastReport, NotificationScheduler, SchedulerSettings};
pub use store::{JsonFileStore, SubscribeOutcome, SubscriberList, SubscriberStore};
