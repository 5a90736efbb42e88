//! Client side of the daemon connection.
//!
//! - `session` keeps the connection alive and tracks the latest daemon state
//! - `socket` speaks the wire protocol over a Unix socket
//! - `pending` carries the result of each in-flight call
//! - `timeout` bounds the whole run

pub mod pending;
pub mod session;
pub mod socket;
pub mod timeout;

pub use session::{Session, Transport};
pub use socket::SocketTransport;
pub use timeout::TimeoutGuard;
