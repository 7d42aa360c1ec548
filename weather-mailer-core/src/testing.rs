//! In-memory stand-ins for the external collaborators.

use async_trait::async_trait;
use std::{
    collections::HashSet,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use crate::{
    error::{MailError, PersistenceError, ProviderError},
    mailer::{Mailer, OutgoingEmail},
    model::Coordinates,
    provider::{ForecastProvider, Geocoder, RawForecast},
    store::SubscriberStore,
};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    list: Mutex<Vec<String>>,
    fail_loads: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn with(emails: &[&str]) -> Self {
        let store = Self::default();
        *lock(&store.list) = emails.iter().map(|e| e.to_string()).collect();
        store
    }

    pub fn snapshot(&self) -> Vec<String> {
        lock(&self.list).clone()
    }

    pub fn push(&self, email: &str) {
        lock(&self.list).push(email.to_string());
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriberStore for MemoryStore {
    async fn load(&self) -> Result<Vec<String>, PersistenceError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory store set to fail".into()));
        }
        Ok(self.snapshot())
    }

    async fn save(&self, subscribers: &[String]) -> Result<(), PersistenceError> {
        *lock(&self.list) = subscribers.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every message; rejects the configured recipients.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    reject: HashSet<String>,
}

impl RecordingMailer {
    pub fn failing_for(recipients: &[&str]) -> Self {
        Self { sent: Mutex::default(), reject: recipients.iter().map(|r| r.to_string()).collect() }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        lock(&self.sent).clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|e| e.to).collect()
    }

    pub fn sent_with_subject(&self, subject: &str) -> Vec<OutgoingEmail> {
        self.sent().into_iter().filter(|e| e.subject == subject).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        if self.reject.contains(&email.to) {
            return Err(MailError::Rejected {
                recipient: email.to.clone(),
                reason: "mailbox unavailable".into(),
            });
        }
        lock(&self.sent).push(email.clone());
        Ok(())
    }
}

/// Returns a fixed forecast (or a failure) and remembers where it was asked about.
#[derive(Debug, Default)]
pub struct FakeProvider {
    response: Mutex<Option<RawForecast>>,
    calls: Mutex<Vec<Coordinates>>,
}

impl FakeProvider {
    pub fn returning(forecast: RawForecast) -> Self {
        Self { response: Mutex::new(Some(forecast)), calls: Mutex::default() }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn set(&self, forecast: Option<RawForecast>) {
        *lock(&self.response) = forecast;
    }

    pub fn calls(&self) -> Vec<Coordinates> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl ForecastProvider for FakeProvider {
    async fn forecast(&self, coords: Coordinates) -> Result<RawForecast, ProviderError> {
        lock(&self.calls).push(coords);
        lock(&self.response).clone().ok_or_else(|| ProviderError::Malformed {
            service: "fake",
            reason: "response contained no forecastday data".into(),
        })
    }
}

#[derive(Debug, Default)]
pub struct FakeGeocoder {
    name: Option<String>,
}

impl FakeGeocoder {
    pub fn named(name: &str) -> Self {
        Self { name: Some(name.to_string()) }
    }

    pub fn failing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn reverse(&self, _coords: Coordinates) -> Result<String, ProviderError> {
        self.name.clone().ok_or_else(|| ProviderError::Malformed {
            service: "fake",
            reason: "no address".into(),
        })
    }
}
