// SPDX-License-Identifier: MIT
//! Cooperative spacing between outbound model calls.
//!
//! The hosted generation API tolerates only a low request rate, so every
//! call first reserves a slot here. Each [`CallThrottle::acquire`] claims
//! the earliest free instant at least `min_interval` after the previous
//! claim and sleeps until it arrives. Claims are made under a mutex but the
//! sleep happens outside it, so concurrent callers queue up with correct
//! spacing instead of racing a shared timestamp.
//!
//! This is deliberately not a token bucket: there is no burst allowance,
//! only a minimum gap between consecutive calls.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Shared throttle for one upstream service.
///
/// Cheaply cloneable — all clones share the same schedule via `Arc`.
#[derive(Clone)]
pub struct CallThrottle {
    min_interval: Duration,
    next_free: Arc<Mutex<Option<Instant>>>,
}

impl CallThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_free: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait until an outbound call is allowed.
    ///
    /// Returns immediately when the schedule is free; otherwise sleeps until
    /// the reserved slot. The reservation is recorded before sleeping, so a
    /// second caller arriving mid-wait is scheduled after this one.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let wait = {
            let mut next_free = self.next_free.lock().await;
            let now = Instant::now();
            let slot = match *next_free {
                Some(at) if at > now => at,
                _ => now,
            };
            *next_free = Some(slot + self.min_interval);
            slot.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "throttling outbound model call");
            tokio::time::sleep(wait).await;
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl std::fmt::Debug for CallThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallThrottle")
            .field("min_interval", &self.min_interval)
            .finish()
    }
}
