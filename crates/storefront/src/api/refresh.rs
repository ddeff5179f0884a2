//! Single-flight session refresh.
//!
//! When several requests hit a 401 at once, only one refresh call may reach
//! the backend. Callers record the refresh generation before sending their
//! request; on a 401 they queue on the coordinator's gate. The first caller
//! through performs the refresh and bumps the generation. Everyone queued
//! behind it sees a newer generation than the one they recorded and reuses
//! the recorded outcome instead of refreshing again.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Mutex;

/// Why a refresh attempt failed. Shared by every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("session refresh failed: {0}")]
pub struct RefreshFailure(pub String);

#[derive(Debug, Default)]
struct RefreshRecord {
    generation: u64,
    outcome: Option<Result<(), RefreshFailure>>,
}

/// Coordinates refresh attempts for one session.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    gate: Mutex<RefreshRecord>,
    generation: AtomicU64,
    in_flight: AtomicBool,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation to record before sending a request that may need recovery.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether a refresh call is currently running.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Join the refresh for `observed`, or start one with `refresh`.
    ///
    /// If a refresh completed after `observed` was recorded, its outcome is
    /// returned without calling `refresh`. If the running refresh is
    /// cancelled, the next queued caller starts a fresh attempt.
    pub async fn refresh<F, Fut>(&self, observed: u64, refresh: F) -> Result<(), RefreshFailure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), RefreshFailure>>,
    {
        let mut record = self.gate.lock().await;

        if record.generation != observed
            && let Some(outcome) = &record.outcome
        {
            tracing::debug!(
                generation = record.generation,
                "Joining completed session refresh"
            );
            return outcome.clone();
        }

        let outcome = {
            let _flag = InFlightFlag::raise(&self.in_flight);
            refresh().await
        };

        record.generation += 1;
        record.outcome = Some(outcome.clone());
        self.generation.store(record.generation, Ordering::Release);
        drop(record);

        outcome
    }
}

/// Holds the in-flight flag up for the duration of a refresh call. Lowered on
/// drop so success, failure and cancellation all clear it.
struct InFlightFlag<'a>(&'a AtomicBool);

impl<'a> InFlightFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for InFlightFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
