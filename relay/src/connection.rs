use mio::net::TcpStream;
use std::sync::Mutex;
use std::time::Instant;
use zsm_common::Identity;

/// A server-side `Connection` (§3): a socket paired with an authenticated
/// identity. Owned by exactly one [`crate::worker::Worker`]'s table, but
/// referenced (via `Arc`) by the acceptor during admission and by any other
/// worker performing a cross-table forward.
pub struct ConnectionEntry {
    pub identity: Identity,
    pub stream: Mutex<TcpStream>,
    pub last_active: Mutex<Instant>,
}

impl ConnectionEntry {
    pub fn new(identity: Identity, stream: TcpStream) -> Self {
        ConnectionEntry { identity, stream: Mutex::new(stream), last_active: Mutex::new(Instant::now()) }
    }

    pub fn touch(&self) {
        *self.last_active.lock().expect("connection mutex poisoned") = Instant::now();
    }

    pub fn idle_for(&self) -> std::time::Duration {
        self.last_active.lock().expect("connection mutex poisoned").elapsed()
    }
}
