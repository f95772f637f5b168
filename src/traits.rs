//! Time abstraction so snapshot freshness can be tested deterministically.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Clone)]
pub struct MockClock {
    utc_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            utc_time: Arc::new(Mutex::new(time)),
        }
    }

    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.utc_time.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut time = self.utc_time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += duration;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc_time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
