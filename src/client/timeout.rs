//! Upper bound on how long a command may wait for the daemon.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default bound for local IPC.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline used when `now + bound` doesn't fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A single deadline shared by every wait in one command invocation.
///
/// The guard is armed once, when the command starts waiting, so waiting for
/// the connection and waiting for the reply draw from the same budget.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    bound: Duration,
    deadline: Instant,
}

/// The bound elapsed before the awaited work finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no response from the daemon within {} seconds", .bound.as_secs())]
pub struct Elapsed {
    pub bound: Duration,
}

impl TimeoutGuard {
    /// Arm the guard now. A bound too large to represent never fires.
    pub fn start(bound: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(bound)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self { bound, deadline }
    }

    pub fn bound(&self) -> Duration {
        self.bound
    }

    /// Race `work` against the deadline.
    ///
    /// Whichever finishes first decides the outcome; the loser is dropped.
    pub async fn race<F>(&self, work: F) -> Result<F::Output, Elapsed>
    where
        F: Future,
    {
        tokio::time::timeout_at(self.deadline, work)
            .await
            .map_err(|_| {
                debug!(bound = ?self.bound, "timed out waiting for the daemon");
                Elapsed { bound: self.bound }
            })
    }
}
