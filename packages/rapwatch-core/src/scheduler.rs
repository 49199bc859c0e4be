//! Daily trigger for the inventory cycle.
//!
//! The wall clock is polled once a minute; the job fires the first time the
//! local hour and minute match, at most once per calendar day. The job is
//! awaited inside the loop, so a new cycle never overlaps the previous one.

use crate::error::ConfigError;
use chrono::{Days, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::future::Future;
use tokio::time::{interval, Duration, MissedTickBehavior};

const POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    hour: u32,
    minute: u32,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ConfigError> {
        if hour > 23 {
            return Err(ConfigError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(ConfigError::MinuteOutOfRange(minute));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn matches<T: Timelike>(&self, time: &T) -> bool {
        time.hour() == self.hour && time.minute() == self.minute
    }

    /// Whether the job is due at `now`, given the day it last fired.
    pub fn is_due(&self, now: &NaiveDateTime, last_fired: Option<NaiveDate>) -> bool {
        self.matches(now) && last_fired != Some(now.date())
    }

    /// Next scheduled run strictly after `now`.
    pub fn next_fire(&self, now: NaiveDateTime) -> NaiveDateTime {
        let at = NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or_default();
        let today = now.date().and_time(at);
        if today > now {
            today
        } else {
            now.date()
                .checked_add_days(Days::new(1))
                .map(|d| d.and_time(at))
                .unwrap_or(today)
        }
    }
}

impl std::fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Run `job` once a day until `shutdown` resolves.
pub async fn run<F, Fut, S>(schedule: DailySchedule, mut job: F, shutdown: S)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
    S: Future<Output = ()>,
{
    let mut ticker = interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut last_fired: Option<NaiveDate> = None;

    tracing::info!(
        "Daily inventory scheduled at {}, next run {}",
        schedule,
        schedule.next_fire(Local::now().naive_local())
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Scheduler stopping");
                break;
            }
            _ = ticker.tick() => {
                let now = Local::now().naive_local();
                if schedule.is_due(&now, last_fired) {
                    last_fired = Some(now.date());
                    job().await;
                    tracing::info!("Next run {}", schedule.next_fire(Local::now().naive_local()));
                }
            }
        }
    }
}
