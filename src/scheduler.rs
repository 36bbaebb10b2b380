//! Scheduled callbacks
//!
//! Timer primitives used by the viewer: a [`Debouncer`] where every new
//! schedule supersedes the pending one, and a [`Throttle`] that coalesces
//! bursts into a single trailing invocation.
//!
//! Both run their callbacks on the tokio runtime, so timer behaviour can be
//! driven deterministically in tests with a paused clock.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::{Duration, Instant};

/// Debounced callback slot
///
/// Scheduling a callback cancels whatever was pending; only the callback
/// scheduled last runs, `delay` after it was scheduled.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `task`, superseding any pending callback
    pub fn schedule<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) == generation {
                task().await;
            }
        });
    }

    /// Drop the pending callback, if any. A callback already running is not
    /// interrupted.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a [`Throttle::trigger`] call did with its task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleOutcome {
    /// Ran right away
    Immediate,
    /// Scheduled as the trailing invocation
    Deferred,
    /// A trailing invocation was already pending; the task was dropped
    Coalesced,
}

#[derive(Debug, Default)]
struct ThrottleState {
    last_run: Option<Instant>,
    trailing_pending: bool,
}

/// Minimum-interval throttle with trailing coalescing
///
/// Tasks passed to `trigger` must read fresh state when they run: a
/// coalesced trigger is represented by whichever task is already pending.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    state: Arc<Mutex<ThrottleState>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Arc::new(Mutex::new(ThrottleState::default())),
        }
    }

    pub fn trigger<F, Fut>(&self, task: F) -> ThrottleOutcome
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let now = Instant::now();
        let mut state = self.state.lock();

        if state.trailing_pending {
            return ThrottleOutcome::Coalesced;
        }

        match state.last_run {
            Some(last) if now.duration_since(last) < self.interval => {
                state.trailing_pending = true;
                let run_at = last + self.interval;
                let shared = Arc::clone(&self.state);

                tokio::spawn(async move {
                    tokio::time::sleep_until(run_at).await;
                    {
                        let mut state = shared.lock();
                        state.trailing_pending = false;
                        state.last_run = Some(Instant::now());
                    }
                    task().await;
                });

                ThrottleOutcome::Deferred
            }
            _ => {
                state.last_run = Some(now);
                tokio::spawn(task());
                ThrottleOutcome::Immediate
            }
        }
    }
}
