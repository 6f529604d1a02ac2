//! Ambient context refresh.
//!
//! [`AmbientRefresher`] keeps the session's time and weather strings current:
//! the clock every minute and the weather every ten minutes by default.
//! Both are written immediately on start so the first prompt already has
//! them.

use crate::config::AmbientConfig;
use crate::session::SessionStore;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Source of the weather summary shown to Niva.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Current weather, or `None` to keep the previous value.
    async fn current(&self) -> Option<String>;
}

/// Weather source that always reports the same summary.
#[derive(Debug, Clone)]
pub struct FixedWeather(pub String);

impl FixedWeather {
    pub fn from_config(config: &AmbientConfig) -> Self {
        Self(config.weather.clone())
    }
}

#[async_trait]
impl WeatherSource for FixedWeather {
    async fn current(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// 12-hour clock string, e.g. `03:07 PM`.
pub fn format_clock<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%I:%M %p").to_string()
}

/// Current local time as a 12-hour clock string.
pub fn local_clock() -> String {
    format_clock(&Local::now())
}

/// Periodically writes time and weather into a [`SessionStore`].
pub struct AmbientRefresher {
    store: Arc<SessionStore>,
    weather: Arc<dyn WeatherSource>,
    cancel: CancellationToken,
    time_period: Duration,
    weather_period: Duration,
}

impl AmbientRefresher {
    /// Refresher with the periods from `config`.
    ///
    /// Call [`run`](Self::run) to start refreshing.
    pub fn new(
        store: Arc<SessionStore>,
        weather: Arc<dyn WeatherSource>,
        config: &AmbientConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            weather,
            cancel,
            time_period: Duration::from_secs(config.time_refresh_s.max(1)),
            weather_period: Duration::from_secs(config.weather_refresh_s.max(1)),
        }
    }

    /// Override both refresh periods.
    pub fn with_periods(mut self, time: Duration, weather: Duration) -> Self {
        self.time_period = time;
        self.weather_period = weather;
        self
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Refresh until the cancellation token fires.
    pub async fn run(self) {
        // The first tick of an interval completes immediately.
        let mut clock = tokio::time::interval(self.time_period);
        let mut forecast = tokio::time::interval(self.weather_period);
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
        forecast.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            time_period_s = self.time_period.as_secs(),
            weather_period_s = self.weather_period.as_secs(),
            "ambient refresh started"
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = clock.tick() => {
                    self.store.update_context(Some(local_clock()), None);
                }
                _ = forecast.tick() => {
                    if let Some(weather) = self.weather.current().await {
                        debug!(%weather, "weather refreshed");
                        self.store.update_context(None, Some(weather));
                    }
                }
            }
        }
        debug!("ambient refresh stopped");
    }
}
