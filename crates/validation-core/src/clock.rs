//! Wall-clock deadlines and sleeping behind an injectable clock.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Source of time for every watcher.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Real time, backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Point in time after which a polling phase gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    end: DateTime<Utc>,
    window: Duration,
}

impl Deadline {
    pub fn after(clock: &dyn Clock, window: Duration) -> Self {
        let span = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let now = clock.now();
        Self {
            end: now.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC),
            window,
        }
    }

    pub fn expired(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.end
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, clock: &dyn Clock) -> Duration {
        (self.end - clock.now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Window rendered for failure messages ("1 minute", "15 minutes").
    pub fn describe(&self) -> String {
        describe_duration(self.window)
    }
}

pub fn describe_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs % 60 == 0 && secs > 0 {
        let minutes = secs / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    } else if secs == 1 {
        "1 second".to_string()
    } else {
        format!("{secs} seconds")
    }
}
