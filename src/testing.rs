//! Test doubles for the daemon side of the connection.

use std::cell::{Cell, RefCell};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use crate::client::pending::{CallError, PendingCall, Resolver};
use crate::client::session::{Connected, Transport, TransportError};
use crate::protocol::{framing, DaemonMessage, Message, Request, Snapshot};

/// In-memory [`Transport`] that records everything asked of it.
pub struct FakeTransport {
    snapshot: RefCell<Snapshot>,
    reachable: Cell<bool>,
    reply: RefCell<Result<Value, CallError>>,
    answers: Cell<bool>,
    connect_attempts: Cell<u32>,
    calls: RefCell<Vec<Request>>,
    links: RefCell<Vec<mpsc::UnboundedSender<Snapshot>>>,
    unanswered: RefCell<Vec<Resolver<Value>>>,
}

impl FakeTransport {
    /// A daemon that accepts connections and answers every call with `null`.
    pub fn new(snapshot: Snapshot) -> Rc<Self> {
        Rc::new(Self {
            snapshot: RefCell::new(snapshot),
            reachable: Cell::new(true),
            reply: RefCell::new(Ok(Value::Null)),
            answers: Cell::new(true),
            connect_attempts: Cell::new(0),
            calls: RefCell::default(),
            links: RefCell::default(),
            unanswered: RefCell::default(),
        })
    }

    /// A daemon that refuses every connection until told otherwise.
    pub fn unreachable(snapshot: Snapshot) -> Rc<Self> {
        let transport = Self::new(snapshot);
        transport.set_reachable(false);
        transport
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.set(reachable);
    }

    /// State handed out by the next connect.
    pub fn set_snapshot(&self, snapshot: Snapshot) {
        self.snapshot.replace(snapshot);
    }

    pub fn reject_with(&self, message: &str) {
        self.reply.replace(Err(CallError::Rejected(message.to_string())));
    }

    /// Accept calls but never answer them.
    pub fn never_reply(&self) {
        self.answers.set(false);
    }

    /// Push state over every open link.
    pub fn push(&self, snapshot: Snapshot) {
        for link in self.links.borrow().iter() {
            let _ = link.send(snapshot.clone());
        }
    }

    /// Simulate the daemon going away.
    pub fn drop_links(&self) {
        self.links.borrow_mut().clear();
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.get()
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Transport for FakeTransport {
    async fn connect(&self) -> Result<Connected, TransportError> {
        self.connect_attempts.set(self.connect_attempts.get() + 1);
        if !self.reachable.get() {
            return Err(TransportError::Connect {
                path: "fake".to_string(),
                source: io::ErrorKind::ConnectionRefused.into(),
            });
        }
        let (sender, updates) = mpsc::unbounded_channel();
        self.links.borrow_mut().push(sender);
        Ok(Connected {
            snapshot: self.snapshot.borrow().clone(),
            updates,
        })
    }

    fn call(&self, request: Request) -> PendingCall<Value> {
        self.calls.borrow_mut().push(request);
        if !self.answers.get() {
            let (resolver, call) = PendingCall::channel();
            self.unanswered.borrow_mut().push(resolver);
            return call;
        }
        match self.reply.borrow().clone() {
            Ok(value) => PendingCall::resolved(value),
            Err(error) => PendingCall::failed(error),
        }
    }
}

enum Outbound {
    Frame(DaemonMessage),
    HangUp,
}

#[derive(Default)]
struct DaemonControl {
    rejection: RefCell<Option<String>>,
    hang_up: Cell<bool>,
    connections: RefCell<Vec<mpsc::UnboundedSender<Outbound>>>,
}

/// A daemon speaking the real wire protocol on a Unix socket.
///
/// Must be spawned inside a [`tokio::task::LocalSet`].
pub struct FakeDaemon {
    socket_path: PathBuf,
    control: Rc<DaemonControl>,
    requests: mpsc::UnboundedReceiver<Request>,
}

impl FakeDaemon {
    pub fn spawn(socket_path: PathBuf, snapshot: Snapshot) -> Self {
        let listener = UnixListener::bind(&socket_path).expect("bind fake daemon socket");
        let control = Rc::new(DaemonControl::default());
        let (requests_tx, requests) = mpsc::unbounded_channel();

        let accept_control = Rc::clone(&control);
        tokio::task::spawn_local(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::task::spawn_local(handle_client(
                    stream,
                    snapshot.clone(),
                    Rc::clone(&accept_control),
                    requests_tx.clone(),
                ));
            }
        });

        Self {
            socket_path,
            control,
            requests,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Answer later calls with this error.
    pub fn reject_with(&self, message: &str) {
        self.control.rejection.replace(Some(message.to_string()));
    }

    /// Close the connection instead of answering calls.
    pub fn hang_up_on_calls(&self) {
        self.control.hang_up.set(true);
    }

    /// Close every open connection now.
    pub fn hang_up(&self) {
        for connection in self.control.connections.borrow().iter() {
            let _ = connection.send(Outbound::HangUp);
        }
    }

    pub fn push_state(&self, snapshot: Snapshot) {
        for connection in self.control.connections.borrow().iter() {
            let _ = connection.send(Outbound::Frame(DaemonMessage::State(snapshot.clone())));
        }
    }

    /// The next request received on any connection.
    pub async fn next_request(&mut self) -> Option<Request> {
        self.requests.recv().await
    }
}

async fn handle_client(
    stream: UnixStream,
    snapshot: Snapshot,
    control: Rc<DaemonControl>,
    requests: mpsc::UnboundedSender<Request>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
    let _ = outbound.send(Outbound::Frame(DaemonMessage::State(snapshot)));
    control.connections.borrow_mut().push(outbound.clone());

    tokio::task::spawn_local(async move {
        while let Some(Outbound::Frame(message)) = outbound_rx.recv().await {
            if framing::write_message(&mut writer, &message).await.is_err() {
                break;
            }
        }
    });

    while let Ok(Message::Call { id, request }) = framing::read_message(&mut reader).await {
        let _ = requests.send(request);
        if control.hang_up.get() {
            let _ = outbound.send(Outbound::HangUp);
            break;
        }
        let reply = match control.rejection.borrow().as_deref() {
            Some(message) => DaemonMessage::error(id, message),
            None => DaemonMessage::success(id, Value::Null),
        };
        let _ = outbound.send(Outbound::Frame(reply));
    }
}
