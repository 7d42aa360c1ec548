//! When and to whom emails go out.
//!
//! [`NotificationScheduler`] owns the last snapshot it delivered, the pending
//! follow-up and heavy-rain timers, and the rules tying them together:
//!
//! - a broadcast goes to every current subscriber, sequentially, and the
//!   first mail failure aborts the rest of it;
//! - the snapshot is remembered only after a broadcast completes;
//! - a follow-up re-broadcasts to whoever is subscribed when it fires;
//! - a heavy-rain alert is armed only if its notify time is still ahead,
//!   and its per-recipient sends are independent of each other.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    compose,
    config::{FollowUpPolicy, ScheduleConfig},
    error::Error,
    forecast::ForecastClient,
    mailer::{self, Mailer},
    model::{BroadcastKind, Coordinates, ForecastSnapshot, HeavyRainHour},
    store::SubscriberList,
    timer::{self, Timers},
};

const FOLLOW_UP_SLOT: &str = "follow-up";

/// Timing knobs, usually derived from [`ScheduleConfig`].
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Home timezone; heavy-rain hour times are read in it.
    pub timezone: Tz,
    pub follow_up_delay: Duration,
    pub alert_lead: Duration,
    pub follow_up_policy: FollowUpPolicy,
    /// Target of the daily broadcast.
    pub daily_location: Coordinates,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&ScheduleConfig::default())
    }
}

impl SchedulerSettings {
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self {
            timezone: config.timezone,
            follow_up_delay: config.follow_up_delay(),
            alert_lead: config.alert_lead(),
            follow_up_policy: config.follow_up_policy,
            daily_location: Coordinates::default_location(),
        }
    }
}

/// What a call to [`NotificationScheduler::send_now`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastReport {
    /// Nobody to send to.
    Skipped,
    Sent { recipients: usize, heavy_rain_alert: bool },
    /// Logged and dropped; nothing is retried.
    Failed,
}

#[derive(Debug)]
pub struct NotificationScheduler {
    subscribers: Arc<SubscriberList>,
    forecast: ForecastClient,
    mailer: Arc<dyn Mailer>,
    settings: SchedulerSettings,
    last_snapshot: Mutex<Option<Arc<ForecastSnapshot>>>,
    /// Held for the whole of a broadcast so `last_snapshot` has one writer.
    broadcast_lock: tokio::sync::Mutex<()>,
    timers: Timers,
}

impl NotificationScheduler {
    pub fn new(
        subscribers: Arc<SubscriberList>,
        forecast: ForecastClient,
        mailer: Arc<dyn Mailer>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            subscribers,
            forecast,
            mailer,
            settings,
            last_snapshot: Mutex::new(None),
            broadcast_lock: tokio::sync::Mutex::new(()),
            timers: Timers::default(),
        }
    }

    pub fn subscribers(&self) -> &Arc<SubscriberList> {
        &self.subscribers
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// The snapshot from the last completed broadcast.
    pub fn last_snapshot(&self) -> Option<Arc<ForecastSnapshot>> {
        self.last_snapshot.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn remember(&self, snapshot: Arc<ForecastSnapshot>) {
        *self.last_snapshot.lock().unwrap_or_else(|p| p.into_inner()) = Some(snapshot);
    }

    /// Timers that are still waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Revoke every pending follow-up and alert.
    pub fn shutdown(&self) {
        self.timers.cancel_all();
    }

    /// Broadcast the forecast for `(lat, lon)` to every subscriber.
    ///
    /// Never fails: errors are logged and reported as
    /// [`BroadcastReport::Failed`].
    pub async fn send_now(self: &Arc<Self>, lat: f64, lon: f64, kind: BroadcastKind) -> BroadcastReport {
        let _guard = self.broadcast_lock.lock().await;

        match self.try_send_now(lat, lon, kind).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, ?kind, lat, lon, "broadcast failed");
                BroadcastReport::Failed
            }
        }
    }

    async fn try_send_now(
        self: &Arc<Self>,
        lat: f64,
        lon: f64,
        kind: BroadcastKind,
    ) -> Result<BroadcastReport, Error> {
        let recipients = self.subscribers.load().await?;
        if recipients.is_empty() {
            tracing::info!("no registered emails to send updates to");
            return Ok(BroadcastReport::Skipped);
        }

        let coords = Coordinates::resolve(lat, lon);
        let snapshot = Arc::new(self.forecast.fetch(coords).await?);

        let previous = if kind.is_follow_up() { self.last_snapshot() } else { None };
        let body = compose::compose(&snapshot, previous.as_deref(), kind);

        let sent =
            mailer::send_all(self.mailer.as_ref(), &recipients, compose::subject(kind), &body).await?;
        tracing::info!(recipients = sent, ?kind, "broadcast complete");

        self.remember(Arc::clone(&snapshot));

        let heavy_rain_alert =
            !kind.is_follow_up() && self.schedule_heavy_rain_alert(&snapshot, recipients);

        Ok(BroadcastReport::Sent { recipients: sent, heavy_rain_alert })
    }

    /// Arm a follow-up broadcast for `(lat, lon)` after the configured delay.
    ///
    /// With [`FollowUpPolicy::Stack`] every call adds a timer; with
    /// [`FollowUpPolicy::Replace`] the newest call wins.
    pub fn schedule_follow_up(self: &Arc<Self>, lat: f64, lon: f64) {
        let this = Arc::clone(self);
        let delay = self.settings.follow_up_delay;

        let handle = timer::defer(FOLLOW_UP_SLOT, delay, async move {
            tracing::info!(lat, lon, "executing follow-up broadcast");
            this.send_now(lat, lon, BroadcastKind::FollowUp).await;
        });

        tracing::info!(delay_secs = delay.as_secs(), policy = ?self.settings.follow_up_policy, "follow-up scheduled");
        match self.settings.follow_up_policy {
            FollowUpPolicy::Stack => self.timers.arm(handle),
            FollowUpPolicy::Replace => self.timers.arm_exclusive(FOLLOW_UP_SLOT, handle),
        }
    }

    /// Arm the heavy-rain alert for `snapshot`, if it has a heavy-rain hour
    /// whose notify time has not passed. Returns whether a timer was armed.
    ///
    /// `recipients` is used only if the store can't be read when the alert fires.
    pub fn schedule_heavy_rain_alert(
        self: &Arc<Self>,
        snapshot: &ForecastSnapshot,
        recipients: Vec<String>,
    ) -> bool {
        let Some(hour) = snapshot.heavy_rain_hour.clone() else {
            return false;
        };

        let Some(delay) =
            alert_delay(&hour, self.settings.timezone, self.settings.alert_lead, Utc::now())
        else {
            tracing::info!(time = %hour.time, "heavy-rain notify time already passed, no alert");
            return false;
        };

        tracing::info!(
            time = %hour.time,
            delay_mins = delay.as_secs() / 60,
            "scheduling heavy rain alert"
        );

        let this = Arc::clone(self);
        let handle = timer::defer("heavy-rain-alert", delay, async move {
            this.deliver_heavy_rain_alert(&hour, recipients).await;
        });
        self.timers.arm(handle);
        true
    }

    async fn deliver_heavy_rain_alert(&self, hour: &HeavyRainHour, captured: Vec<String>) {
        let recipients = match self.subscribers.load().await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "could not reload subscribers, alerting the earlier list");
                captured
            }
        };

        // Fire and forget: failures are logged per recipient.
        let _ = mailer::fan_out(
            Arc::clone(&self.mailer),
            &recipients,
            compose::HEAVY_RAIN_SUBJECT,
            &compose::heavy_rain_alert(hour),
        );
    }

    /// The once-a-day broadcast to the fixed daily location.
    pub async fn run_daily_broadcast(self: &Arc<Self>) -> BroadcastReport {
        let coords = self.settings.daily_location;
        tracing::info!(lat = coords.lat(), lon = coords.lon(), "sending daily update");
        self.send_now(coords.lat(), coords.lon(), BroadcastKind::Regular).await
    }
}

/// How long to wait before alerting about `hour`, or `None` if the notify
/// time (`hour` minus `lead`) is not in the future.
pub fn alert_delay(
    hour: &HeavyRainHour,
    tz: Tz,
    lead: Duration,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let naive = match NaiveDateTime::parse_from_str(&hour.time, "%Y-%m-%d %H:%M") {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(time = %hour.time, error = %e, "unparseable heavy-rain time");
            return None;
        }
    };

    let rain_at = tz.from_local_datetime(&naive).earliest()?.with_timezone(&Utc);
    let notify_at = rain_at - chrono::Duration::from_std(lead).ok()?;

    (notify_at - now).to_std().ok().filter(|d| !d.is_zero())
}
