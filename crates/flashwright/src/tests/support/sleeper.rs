//! Sleeper double that records requested pauses instead of sleeping.

use std::sync::Mutex;
use std::time::Duration;

use crate::query::Sleeper;

#[derive(Debug, Default)]
pub struct CountingSleeper {
    pauses: Mutex<Vec<Duration>>,
}

impl CountingSleeper {
    /// Number of pauses requested so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.pauses.lock().expect("sleeper mutex poisoned").len()
    }
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, duration: Duration) {
        self.pauses
            .lock()
            .expect("sleeper mutex poisoned")
            .push(duration);
    }
}
