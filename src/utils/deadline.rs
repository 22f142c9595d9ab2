//! Per-call deadlines
//!
//! Every store and cache operation receives an explicit `Deadline` instead of
//! relying on ambient cancellation state.

use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

/// Fixed budget for a single store or cache operation
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Absolute point in time by which an operation must complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

/// Returned when the deadline passed before the operation completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    pub budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// The standard per-operation deadline
    pub fn query() -> Self {
        Self::after(QUERY_TIMEOUT)
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Drive `fut` to completion or fail once the deadline passes
    pub async fn run<F, T>(self, fut: F) -> Result<T, Elapsed>
    where
        F: Future<Output = T>,
    {
        let budget = self.remaining();
        timeout_at(self.at, fut).await.map_err(|_| Elapsed { budget })
    }
}
