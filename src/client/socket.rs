//! Unix socket transport for communicating with the daemon.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::debug;

use super::pending::{CallError, PendingCall, Resolver};
use super::session::{Connected, Transport, TransportError};
use crate::protocol::{framing, DaemonMessage, Message, Request, Snapshot};

type InFlight = Rc<RefCell<HashMap<u64, Resolver<Value>>>>;

/// [`Transport`] over the daemon's Unix domain socket.
///
/// Each link spawns a reader and a writer task on the current
/// [`tokio::task::LocalSet`]. Replies are matched to calls by id.
pub struct SocketTransport {
    socket_path: PathBuf,
    link: RefCell<Option<Link>>,
    next_id: Cell<u64>,
}

struct Link {
    outgoing: mpsc::UnboundedSender<Message>,
    in_flight: InFlight,
    /// Cleared by the reader when the daemon side goes away.
    open: Rc<Cell<bool>>,
}

impl SocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            link: RefCell::new(None),
            next_id: Cell::new(1),
        }
    }
}

#[async_trait(?Send)]
impl Transport for SocketTransport {
    async fn connect(&self) -> Result<Connected, TransportError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| TransportError::Connect {
                path: self.socket_path.display().to_string(),
                source,
            })?;
        let (mut reader, writer) = stream.into_split();

        let snapshot = match framing::read_message(&mut reader).await? {
            DaemonMessage::State(snapshot) => snapshot,
            other => {
                return Err(TransportError::Handshake(format!(
                    "expected state, got {other:?}"
                )))
            }
        };
        debug!(
            locations = snapshot.locations.len(),
            "received daemon state"
        );

        let in_flight: InFlight = Rc::default();
        let open = Rc::new(Cell::new(true));
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates) = mpsc::unbounded_channel();
        tokio::task::spawn_local(write_loop(writer, outgoing_rx, Rc::clone(&in_flight)));
        tokio::task::spawn_local(read_loop(
            reader,
            updates_tx,
            Rc::clone(&in_flight),
            Rc::clone(&open),
        ));

        self.link.replace(Some(Link {
            outgoing,
            in_flight,
            open,
        }));
        Ok(Connected { snapshot, updates })
    }

    fn call(&self, request: Request) -> PendingCall<Value> {
        let mut slot = self.link.borrow_mut();
        let Some(link) = slot.as_ref() else {
            return PendingCall::failed(CallError::NotConnected);
        };
        if !link.open.get() {
            // Dropping the link stops its writer.
            slot.take();
            debug!("call on a link the daemon already closed");
            return PendingCall::failed(CallError::ConnectionLost);
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let (resolver, call) = PendingCall::channel();
        link.in_flight.borrow_mut().insert(id, resolver);
        if link.outgoing.send(Message::Call { id, request }).is_err() {
            if let Some(resolver) = link.in_flight.borrow_mut().remove(&id) {
                resolver.fail(CallError::ConnectionLost);
            }
        }
        call
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    in_flight: InFlight,
) {
    while let Some(message) = outgoing.recv().await {
        if let Err(error) = framing::write_message(&mut writer, &message).await {
            debug!(%error, "failed to send request to daemon");
            let Message::Call { id, .. } = message;
            if let Some(resolver) = in_flight.borrow_mut().remove(&id) {
                resolver.fail(CallError::ConnectionLost);
            }
            break;
        }
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    updates: mpsc::UnboundedSender<Snapshot>,
    in_flight: InFlight,
    open: Rc<Cell<bool>>,
) {
    loop {
        let message: DaemonMessage = match framing::read_message(&mut reader).await {
            Ok(message) => message,
            Err(error) => {
                debug!(%error, "daemon link closed");
                break;
            }
        };

        match message {
            DaemonMessage::State(snapshot) => {
                let _ = updates.send(snapshot);
            }
            DaemonMessage::Reply { id, result, error } => {
                let Some(resolver) = in_flight.borrow_mut().remove(&id) else {
                    debug!(id, "reply for unknown call");
                    continue;
                };
                match error {
                    Some(message) => resolver.fail(CallError::Rejected(message)),
                    None => resolver.resolve(result.unwrap_or(Value::Null)),
                }
            }
        }
    }

    // Dropping the resolvers fails every call still waiting on this link.
    open.set(false);
    in_flight.borrow_mut().clear();
}
