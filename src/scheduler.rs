//! Auto-post scheduler: fires at most once per configured time-of-day, with
//! a persisted watermark enforcing a 60-second cooldown across restarts.
//!
//! Heartbeats drive `tick`; the tick is a no-op unless auto-posting is
//! enabled, the local `HH:MM` string matches a configured trigger time, and
//! the cooldown has elapsed. A late heartbeat still fires as long as it lands
//! inside the matching minute.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    sync::Mutex,
};

use crate::{
    dispatch::Dispatcher,
    domain::Visibility,
    ports::{LogSink, WeatherProvider},
    text,
};

/// Cooldown between autonomous posts.
const COOLDOWN_SECS: i64 = 60;

pub struct AutoPoster {
    enabled: bool,
    times: Vec<String>,
    max_post_length: usize,
    watermark_path: PathBuf,
    last: Mutex<i64>,
    dispatcher: Arc<Dispatcher>,
    weather: Option<Arc<dyn WeatherProvider>>,
    journal: Arc<dyn LogSink>,
}

impl AutoPoster {
    pub fn new(
        enabled: bool,
        times: Vec<String>,
        max_post_length: usize,
        watermark_path: PathBuf,
        dispatcher: Arc<Dispatcher>,
        weather: Option<Arc<dyn WeatherProvider>>,
        journal: Arc<dyn LogSink>,
    ) -> Self {
        let last = load_watermark(&watermark_path);
        Self {
            enabled,
            times,
            max_post_length,
            watermark_path,
            last: Mutex::new(last),
            dispatcher,
            weather,
            journal,
        }
    }

    /// One heartbeat. Returns whether an autonomous post was published.
    ///
    /// The post is assembled as time clause + brain babble + weather clause;
    /// the fixed clauses are measured first and the brain is asked for a
    /// line sized to the remainder, so truncation lands on the babble.
    pub async fn tick(&self, now: i64, local_time: &str) -> bool {
        if !self.enabled || !self.times.iter().any(|t| t == local_time) {
            return false;
        }
        {
            let last = *self.last.lock().expect("watermark lock");
            if now - last < COOLDOWN_SECS {
                return false;
            }
        }

        let time_clause = format!("It is {local_time}. ");
        let weather_clause = match &self.weather {
            Some(provider) => provider.current_summary().await.unwrap_or_default(),
            None => String::new(),
        };

        let budget = self
            .max_post_length
            .saturating_sub(time_clause.chars().count() + weather_clause.chars().count());
        let babble = match self.dispatcher.query_nolearn("", budget).await {
            Ok(raw) => text::format_reply(&raw, budget),
            Err(e) => {
                self.journal
                    .record(&format!("* error retrieving a reply for auto-post: {e}"));
                return false;
            }
        };

        let post = format!("{time_clause}{babble}{weather_clause}");
        match self.dispatcher.post(&post, Visibility::Unlisted, true).await {
            Ok(_) => {
                *self.last.lock().expect("watermark lock") = now;
                self.store_watermark(now);
                true
            }
            Err(e) => {
                // Watermark stays put so the next qualifying tick can retry.
                self.journal
                    .record(&format!("* error publishing auto-post: {e}"));
                false
            }
        }
    }

    fn store_watermark(&self, now: i64) {
        let tmp = self.watermark_path.with_extension("tmp");
        let result = fs::write(&tmp, now.to_string())
            .and_then(|()| fs::rename(&tmp, &self.watermark_path));
        if let Err(e) = result {
            tracing::warn!(path = %self.watermark_path.display(), error = %e,
                "failed to persist auto-post watermark");
        }
    }
}

/// Epoch second of the last successful autonomous post. Absent or
/// unparseable files read as 0.
pub fn load_watermark(path: &Path) -> i64 {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}
