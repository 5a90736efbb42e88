//! Connection lifecycle to the daemon.
//!
//! A [`Session`] owns a background driver that keeps (re)connecting through a
//! [`Transport`]. The first successful connection is the one event commands
//! wait for; later reconnects refresh state silently.

use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::pending::{CallError, PendingCall};
use crate::protocol::{framing::FrameError, Request, Snapshot};

/// Errors establishing a link to the daemon.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to daemon at {path}: {source}")]
    Connect {
        path: String,
        source: std::io::Error,
    },
    #[error("daemon did not send its state: {0}")]
    Handshake(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// A freshly opened link.
#[derive(Debug)]
pub struct Connected {
    /// State at the moment the link opened.
    pub snapshot: Snapshot,
    /// Later state pushed by the daemon. Closes when the link drops.
    pub updates: mpsc::UnboundedReceiver<Snapshot>,
}

/// The channel that carries requests to the daemon.
#[async_trait(?Send)]
pub trait Transport {
    /// Open the channel and fetch the daemon's current state.
    async fn connect(&self) -> Result<Connected, TransportError>;

    /// Submit a request over the open channel without waiting for the reply.
    fn call(&self, request: Request) -> PendingCall<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// The first connection of this process. Entered at most once.
    ActiveFirst,
    /// Any connection after the first.
    ActiveSubsequent,
    Closed,
}

impl SessionState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::ActiveFirst | Self::ActiveSubsequent)
    }
}

/// The session was closed before the daemon ever became active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session closed before the daemon connection became active")]
pub struct SessionClosed;

enum FirstActivation {
    Waiting(Vec<oneshot::Sender<()>>),
    Fired,
    Closed,
}

struct Inner {
    transport: Rc<dyn Transport>,
    state: Cell<SessionState>,
    snapshot: RefCell<Option<Rc<Snapshot>>>,
    first_active: RefCell<FirstActivation>,
    connect_attempts: Cell<u32>,
}

/// Client-side owner of the daemon connection.
///
/// Must be created inside a [`tokio::task::LocalSet`]; the driver and every
/// continuation run on that single thread.
pub struct Session {
    inner: Rc<Inner>,
    driver: JoinHandle<()>,
}

impl Session {
    /// Start connecting in the background, retrying every `retry_interval`.
    pub fn start(transport: Rc<dyn Transport>, retry_interval: Duration) -> Self {
        let inner = Rc::new(Inner {
            transport,
            state: Cell::new(SessionState::Disconnected),
            snapshot: RefCell::new(None),
            first_active: RefCell::new(FirstActivation::Waiting(Vec::new())),
            connect_attempts: Cell::new(0),
        });
        let driver = tokio::task::spawn_local(drive(Rc::clone(&inner), retry_interval));
        Self { inner, driver }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.get()
    }

    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.get()
    }

    /// Wait for the first successful connection.
    ///
    /// Returns at once if it already happened. Reconnects never wake waiters.
    pub async fn first_active(&self) -> Result<(), SessionClosed> {
        let receiver = {
            let mut first_active = self.inner.first_active.borrow_mut();
            match &mut *first_active {
                FirstActivation::Fired => return Ok(()),
                FirstActivation::Closed => return Err(SessionClosed),
                FirstActivation::Waiting(waiters) => {
                    let (sender, receiver) = oneshot::channel();
                    waiters.push(sender);
                    receiver
                }
            }
        };
        receiver.await.map_err(|_| SessionClosed)
    }

    /// The most recent daemon state.
    ///
    /// # Panics
    ///
    /// Panics if called before the first activation.
    pub fn snapshot(&self) -> Rc<Snapshot> {
        let snapshot = self.inner.snapshot.borrow();
        let snapshot = snapshot
            .as_ref()
            .expect("snapshot read before the daemon connection became active");
        Rc::clone(snapshot)
    }

    /// Issue a call to the daemon.
    ///
    /// Fails immediately unless a connection is active.
    pub fn call(&self, method: &str, args: Vec<Value>) -> PendingCall<Value> {
        let request = Request {
            method: method.to_string(),
            args,
        };
        if !self.state().is_active() {
            debug!(method = %request.method, state = ?self.state(), "call rejected, not connected");
            return PendingCall::failed(CallError::NotConnected);
        }
        debug!(method = %request.method, "calling daemon");
        self.inner.transport.call(request)
    }

    /// Stop the driver. Pending first-activation waiters see [`SessionClosed`].
    pub fn close(&self) {
        self.driver.abort();
        self.inner.state.set(SessionState::Closed);
        let mut first_active = self.inner.first_active.borrow_mut();
        if matches!(*first_active, FirstActivation::Waiting(_)) {
            *first_active = FirstActivation::Closed;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl Inner {
    fn activate(&self, snapshot: Snapshot) {
        self.snapshot.replace(Some(Rc::new(snapshot)));
        let previous = mem::replace(&mut *self.first_active.borrow_mut(), FirstActivation::Fired);
        match previous {
            FirstActivation::Waiting(waiters) => {
                info!("connected to daemon");
                self.state.set(SessionState::ActiveFirst);
                for waiter in waiters {
                    let _ = waiter.send(());
                }
            }
            FirstActivation::Fired => {
                debug!("reconnected to daemon");
                self.state.set(SessionState::ActiveSubsequent);
            }
            FirstActivation::Closed => {
                self.first_active.replace(FirstActivation::Closed);
            }
        }
    }

    fn refresh(&self, snapshot: Snapshot) {
        debug!("daemon state refreshed");
        self.snapshot.replace(Some(Rc::new(snapshot)));
    }
}

async fn drive(inner: Rc<Inner>, retry_interval: Duration) {
    loop {
        inner.state.set(SessionState::Connecting);
        inner.connect_attempts.set(inner.connect_attempts.get() + 1);

        match inner.transport.connect().await {
            Ok(Connected {
                snapshot,
                mut updates,
            }) => {
                inner.activate(snapshot);
                while let Some(snapshot) = updates.recv().await {
                    inner.refresh(snapshot);
                }
                debug!("lost connection to daemon");
            }
            Err(error) => {
                debug!(attempt = inner.connect_attempts.get(), %error, "daemon not reachable");
            }
        }

        inner.state.set(SessionState::Disconnected);
        tokio::time::sleep(retry_interval).await;
    }
}
