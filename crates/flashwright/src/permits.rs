//! Host-wide limit on concurrent flashing.
//!
//! Flashing saturates USB bandwidth and host I/O, so a host may cap how many
//! devices flash at once. Every lifecycle on the host shares one
//! [`FlashPermits`] value; cloning it shares the same pool.
//! [`FlashPermits::host`] hands out the process-wide pool.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

const PERMITS_TARGET: &str = "flashwright::permits";

static HOST_PERMITS: OnceCell<FlashPermits> = OnceCell::new();

#[derive(Debug)]
struct Pool {
    limit: usize,
    in_use: Mutex<usize>,
    released: Condvar,
}

/// Shared limiter handing out flash permits.
#[derive(Debug, Clone, Default)]
pub struct FlashPermits {
    pool: Option<Arc<Pool>>,
}

impl FlashPermits {
    /// A limiter that never blocks.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self { pool: None }
    }

    /// A limiter allowing at most `limit` concurrent flashes. A limit of
    /// zero is treated as one.
    #[must_use]
    pub fn bounded(limit: usize) -> Self {
        Self {
            pool: Some(Arc::new(Pool {
                limit: limit.max(1),
                in_use: Mutex::new(0),
                released: Condvar::new(),
            })),
        }
    }

    /// Builds a limiter from an optional configured limit.
    #[must_use]
    pub fn from_limit(limit: Option<usize>) -> Self {
        limit.map_or_else(Self::unlimited, Self::bounded)
    }

    /// Returns the process-wide limiter, sized from `limit` on first use.
    ///
    /// Later calls share the existing pool; a differing limit is logged and
    /// ignored.
    #[must_use]
    pub fn host(limit: Option<usize>) -> Self {
        let permits = HOST_PERMITS.get_or_init(|| {
            debug!(target: PERMITS_TARGET, limit = ?limit, "creating host flash permits");
            Self::from_limit(limit)
        });
        let requested = limit.map(|value| value.max(1));
        if permits.limit() != requested {
            warn!(
                target: PERMITS_TARGET,
                active = ?permits.limit(),
                requested = ?requested,
                "host flash permits already sized; keeping the active limit"
            );
        }
        permits.clone()
    }

    /// Configured limit, if any.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.pool.as_ref().map(|pool| pool.limit)
    }

    /// Number of permits currently held.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.pool.as_ref().map_or(0, |pool| {
            *pool.in_use.lock().unwrap_or_else(PoisonError::into_inner)
        })
    }

    /// Blocks until a permit is free and returns it. The permit is released
    /// when dropped.
    pub fn acquire(&self) -> FlashPermit {
        let Some(pool) = self.pool.as_ref() else {
            return FlashPermit { pool: None };
        };

        let mut in_use = pool.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        while *in_use >= pool.limit {
            debug!(
                target: PERMITS_TARGET,
                in_use = *in_use,
                limit = pool.limit,
                "waiting for a flash permit"
            );
            in_use = pool
                .released
                .wait(in_use)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *in_use += 1;
        FlashPermit {
            pool: Some(Arc::clone(pool)),
        }
    }
}

/// Permission to flash one device.
#[derive(Debug)]
#[must_use = "dropping the permit releases it immediately"]
pub struct FlashPermit {
    pool: Option<Arc<Pool>>,
}

impl Drop for FlashPermit {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            let mut in_use = pool.in_use.lock().unwrap_or_else(PoisonError::into_inner);
            *in_use = in_use.saturating_sub(1);
            pool.released.notify_one();
        }
    }
}
