//! Time source for server-assigned timestamps (`done_at`, `enrolled_at`, ...).

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock that only moves when told to. Used to make deployment ordering
/// deterministic in tests.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self { Self { now: Mutex::new(start) } }

  /// Start at `secs` seconds after the Unix epoch.
  pub fn at_secs(secs: i64) -> Self {
    Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
  }

  pub fn set(&self, to: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(|p| p.into_inner()) = to;
  }

  pub fn set_secs(&self, secs: i64) {
    self.set(DateTime::from_timestamp(secs, 0).unwrap_or_default());
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
    *now += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(|p| p.into_inner())
  }
}
