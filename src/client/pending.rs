//! Single-assignment results for in-flight daemon calls.
//!
//! A [`PendingCall`] is handed out as soon as a request is submitted. Its
//! matching [`Resolver`] stays with whoever will eventually see the daemon's
//! answer. Both halves are consumed on use: a call resolves at most once and
//! accepts exactly one continuation.

use thiserror::Error;
use tokio::sync::oneshot;

/// Why a call did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The daemon answered with an error.
    #[error("daemon rejected the request: {0}")]
    Rejected(String),
    /// The call was issued while no connection was active.
    #[error("not connected to the daemon")]
    NotConnected,
    /// The connection dropped before the daemon answered.
    #[error("lost connection to the daemon before it replied")]
    ConnectionLost,
}

type Outcome<T> = Result<T, CallError>;

/// The eventual result of one remote call.
#[must_use = "a pending call does nothing unless a continuation is registered"]
#[derive(Debug)]
pub struct PendingCall<T> {
    receiver: oneshot::Receiver<Outcome<T>>,
}

/// The write side of a [`PendingCall`].
#[derive(Debug)]
pub struct Resolver<T> {
    sender: oneshot::Sender<Outcome<T>>,
}

impl<T> PendingCall<T> {
    /// Create an unresolved call together with its resolver.
    pub fn channel() -> (Resolver<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        (Resolver { sender }, Self { receiver })
    }

    /// A call that has already succeeded.
    #[cfg(test)]
    pub fn resolved(value: T) -> Self {
        let (resolver, call) = Self::channel();
        resolver.resolve(value);
        call
    }

    /// A call that has already failed.
    pub fn failed(error: CallError) -> Self {
        let (resolver, call) = Self::channel();
        resolver.fail(error);
        call
    }

    /// Register the continuation and wait for it to run.
    ///
    /// The continuation runs exactly once, on the calling task, with either
    /// the value or the error. If the call already resolved it runs without
    /// suspending. Taking `self` by value rules out a second registration.
    pub async fn next<F, R>(self, continuation: F) -> R
    where
        F: FnOnce(Outcome<T>) -> R,
    {
        let outcome = self
            .receiver
            .await
            .unwrap_or(Err(CallError::ConnectionLost));
        continuation(outcome)
    }
}

impl<T> Resolver<T> {
    /// Settle the call with a value.
    pub fn resolve(self, value: T) {
        self.complete(Ok(value));
    }

    /// Settle the call with an error.
    pub fn fail(self, error: CallError) {
        self.complete(Err(error));
    }

    /// Settle the call with an outcome.
    ///
    /// Nobody listening is fine: once sent, a request is fire-and-forget.
    pub fn complete(self, outcome: Outcome<T>) {
        let _ = self.sender.send(outcome);
    }
}
