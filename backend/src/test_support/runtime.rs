//! Clock and sleeper doubles for scheduler tests.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;

use crate::domain::CycleSleeper;

/// Clock whose current instant is set by the test.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Start the clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *self.lock_clock() += delta;
    }

    /// Move the clock forward by whole minutes.
    pub fn advance_minutes(&self, minutes: i64) {
        *self.lock_clock() += TimeDelta::minutes(minutes);
    }

    /// Move the clock forward by whole hours.
    pub fn advance_hours(&self, hours: i64) {
        *self.lock_clock() += TimeDelta::hours(hours);
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Sleeper that returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateSleeper;

#[async_trait]
impl CycleSleeper for ImmediateSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Sleeper that records requested durations and yields to the runtime.
#[derive(Default)]
pub struct RecordingSleeper(pub Mutex<Vec<Duration>>);

impl RecordingSleeper {
    /// Durations requested so far.
    pub fn recorded(&self) -> Vec<Duration> {
        match self.0.lock() {
            Ok(entries) => entries.clone(),
            Err(_) => panic!("sleeper mutex"),
        }
    }
}

#[async_trait]
impl CycleSleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        {
            let mut entries = match self.0.lock() {
                Ok(entries) => entries,
                Err(_) => panic!("sleeper mutex"),
            };
            entries.push(duration);
        }
        tokio::task::yield_now().await;
    }
}
