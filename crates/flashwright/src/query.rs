//! Bounded retries for short device queries.
//!
//! Bootloaders and freshly booted shells sometimes answer a query with
//! nothing. [`BoundedQuery`] reissues such queries a fixed number of times,
//! pausing between attempts through an injectable [`Sleeper`].

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::channel::ChannelError;

const QUERY_TARGET: &str = "flashwright::query";

/// Blocks the calling thread between retries.
pub trait Sleeper: Send + Sync {
    /// Pauses for `duration`.
    fn sleep(&self, duration: Duration);
}

impl<T> Sleeper for Arc<T>
where
    T: Sleeper,
{
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Sleeper backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Errors returned by [`BoundedQuery::run`].
#[derive(Debug, Error)]
pub enum QueryError {
    /// Every attempt produced an empty or unparseable answer.
    #[error("query '{query}' returned no usable value after {attempts} attempts")]
    Exhausted {
        /// Name of the query.
        query: String,
        /// Attempts made.
        attempts: u32,
    },
    /// The channel failed while answering.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Retry policy for short queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedQuery {
    attempts: u32,
    interval: Duration,
}

impl BoundedQuery {
    /// Creates a policy; at least one attempt is always made.
    #[must_use]
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
        }
    }

    /// Maximum attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Runs `query` until it yields a non-blank value.
    ///
    /// Channel errors end the retries immediately. The sleeper is only used
    /// between attempts, never after the last one.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Exhausted`] when every attempt came back blank and
    /// [`QueryError::Channel`] when the channel failed.
    pub fn run<F>(
        &self,
        name: &str,
        sleeper: &dyn Sleeper,
        mut query: F,
    ) -> Result<String, QueryError>
    where
        F: FnMut() -> Result<Option<String>, ChannelError>,
    {
        for attempt in 1..=self.attempts {
            if let Some(value) = query()?.filter(|value| !value.trim().is_empty()) {
                return Ok(value.trim().to_owned());
            }
            debug!(
                target: QUERY_TARGET,
                query = name,
                attempt,
                attempts = self.attempts,
                "query returned no value"
            );
            if attempt < self.attempts {
                sleeper.sleep(self.interval);
            }
        }
        Err(QueryError::Exhausted {
            query: name.to_owned(),
            attempts: self.attempts,
        })
    }
}
