use crate::connection::ConnectionEntry;
use crate::error::RelayError;
use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};
use slog::{debug, error, info, warn};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zsm_common::{Identity, Status};
use zsm_packet::{Packet, PacketError};

pub type Table = Arc<Mutex<HashMap<Identity, Arc<ConnectionEntry>>>>;

/// Maximum simultaneous connections a single worker's table may hold (§4.3).
pub const MAX_CLIENTS_PER_THREAD: usize = 1024;

/// Bounded `poll` wait, so the idle-timeout sweep runs periodically even on
/// a worker that never sees a readable event (§4.3 `[NEW]` idle timeout).
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// `Read + Write` adapter that retries on `WouldBlock` instead of
/// surfacing it, so a non-blocking `mio` socket can be driven through
/// `zsm_packet`'s blocking-style codec exactly as §5 describes ("blocking
/// reads are acceptable inside a worker").
struct Blocking<'a>(&'a mut TcpStream);

impl<'a> Read for Blocking<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.0.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => std::thread::yield_now(),
                other => return other,
            }
        }
    }
}

impl<'a> Write for Blocking<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match self.0.write(buf) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => std::thread::yield_now(),
                other => return other,
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// One worker: an I/O-readiness handle, its own connection table, and
/// (read-only) handles to every other worker's table for cross-worker
/// recipient lookup (§4.3, §9 "Global mutable state").
pub struct Worker {
    id: usize,
    poll: Poll,
    receiver: crossbeam_channel::Receiver<Arc<ConnectionEntry>>,
    table: Table,
    all_tables: Vec<Table>,
    token_map: HashMap<Token, Identity>,
    next_token: usize,
    idle_timeout: Duration,
    logger: slog::Logger,
}

impl Worker {
    pub fn new(
        id: usize,
        receiver: crossbeam_channel::Receiver<Arc<ConnectionEntry>>,
        table: Table,
        all_tables: Vec<Table>,
        idle_timeout: Duration,
        logger: slog::Logger,
    ) -> io::Result<Self> {
        Ok(Worker {
            id,
            poll: Poll::new()?,
            receiver,
            table,
            all_tables,
            token_map: HashMap::new(),
            next_token: 0,
            idle_timeout,
            logger,
        })
    }

    /// Runs the worker's forward loop forever. Intended to be the body of a
    /// dedicated OS thread (§5 scheduling model).
    pub fn run(mut self) {
        let mut events = Events::with_capacity(64);
        loop {
            while let Ok(entry) = self.receiver.try_recv() {
                self.register(entry);
            }

            if let Err(err) = self.poll.poll(&mut events, Some(POLL_INTERVAL)) {
                error!(self.logger, "poll wait failed"; "worker" => self.id, "error" => %err);
                continue;
            }

            for event in events.iter() {
                if event.is_readable() {
                    self.handle_readable(event.token());
                }
            }

            self.sweep_idle();
        }
    }

    fn register(&mut self, entry: Arc<ConnectionEntry>) {
        let token = Token(self.next_token);
        self.next_token += 1;
        {
            let mut stream = entry.stream.lock().expect("connection mutex poisoned");
            if let Err(err) = self.poll.registry().register(&mut *stream, token, Interest::READABLE) {
                error!(self.logger, "failed to register connection with poll"; "error" => %err);
                return;
            }
        }
        info!(self.logger, "connection admitted"; "worker" => self.id, "peer" => entry.identity.to_hex());
        self.token_map.insert(token, entry.identity);
    }

    /// `mio`'s registrations are edge-triggered: a readable event fires once
    /// per arrival of new bytes, so a second packet already sitting in the
    /// socket buffer behind the first would raise no further event and the
    /// connection would stall. Drain every complete packet currently
    /// buffered before returning to `poll`, peeking ahead of each decode to
    /// tell "nothing left right now" apart from "more of this packet is
    /// still arriving" (§4.3/§5's level-triggered model, emulated here).
    fn handle_readable(&mut self, token: Token) {
        let identity = match self.token_map.get(&token) {
            Some(identity) => *identity,
            None => return,
        };
        let entry = match self.table.lock().expect("table mutex poisoned").get(&identity) {
            Some(entry) => entry.clone(),
            None => return,
        };

        loop {
            let has_data = {
                let guard = entry.stream.lock().expect("connection mutex poisoned");
                let mut probe = [0u8; 1];
                match guard.peek(&mut probe) {
                    Ok(0) => None,
                    Ok(_) => Some(true),
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => Some(false),
                    Err(_) => Some(true), // let the real decode below surface the error
                }
            };

            match has_data {
                Some(false) => return, // socket drained; the next readable event will wake us
                None => {
                    self.teardown(token, &identity, None);
                    return;
                }
                Some(true) => {}
            }

            let packet = {
                let mut guard = entry.stream.lock().expect("connection mutex poisoned");
                let mut io = Blocking(&mut guard);
                zsm_packet::decode(&mut io)
            };

            // `zmr -d` packet tracing (§4.3 `[NEW]` Server CLI): one DEBUG
            // line per packet header seen, regardless of outcome. A no-op at
            // the default INFO level since `slog-term`'s level filter drops
            // it.
            if let Ok(ref packet) = packet {
                let (type_label, data_len): (&str, usize) = match packet {
                    Packet::Signed { packet_type, data, .. } => (packet_type_label(*packet_type), data.len()),
                    Packet::StatusOnly(_) => ("status", 0),
                };
                debug!(self.logger, "packet"; "worker" => self.id, "peer" => identity.to_hex(), "type" => type_label, "len" => data_len);
            }

            match packet {
                Ok(Packet::Signed { packet_type: zsm_common::PacketType::Message, data, signature }) => {
                    match self.handle_message(&entry, &data, &signature) {
                        Ok(()) => entry.touch(),
                        Err(err) if err.is_fatal() => {
                            self.teardown(token, &identity, Some(err.to_status()));
                            return;
                        }
                        Err(err) => {
                            self.send_status(&entry, err.to_status());
                            entry.touch();
                        }
                    }
                }
                Ok(_) => {
                    // AUTH/UPDATE_MESSAGE/DELETE_MESSAGE/status-only packets
                    // are not valid once a connection is Active; this is the
                    // "bad type" recoverable case of the §4.3 state machine.
                    self.send_status(&entry, Status::InvalidType);
                    entry.touch();
                }
                Err(PacketError::ClosedConnection) => {
                    self.teardown(token, &identity, None);
                    return;
                }
                Err(PacketError::TooLong) => {
                    self.teardown(token, &identity, None);
                    return;
                }
                Err(PacketError::InvalidType { .. }) => entry.touch(),
                Err(PacketError::ReadingSocket { .. }) => {
                    self.teardown(token, &identity, None);
                    return;
                }
                Err(PacketError::WritingSocket { .. }) => {
                    self.teardown(token, &identity, None);
                    return;
                }
            }
        }
    }

    fn handle_message(&self, entry: &ConnectionEntry, data: &[u8], signature: &[u8; 64]) -> Result<(), RelayError> {
        if data.len() < 64 {
            return Err(RelayError::Crypto(zsm_crypto::CryptoError::MalformedPayload("MESSAGE data shorter than sender+recipient")));
        }

        if &data[0..32] != entry.identity.as_ref() {
            return Err(RelayError::Crypto(zsm_crypto::CryptoError::Integrity));
        }
        zsm_crypto::verify(data, signature, &entry.identity)?;

        let recipient = Identity::try_from(&data[32..64])
            .map_err(|_| RelayError::Crypto(zsm_crypto::CryptoError::MalformedPayload("recipient slice is not 32 bytes")))?;

        let recipient_entry = self.find_recipient(&recipient).ok_or(RelayError::UnknownRecipient)?;

        // Re-emit the exact bytes received: no re-signing, no re-encryption
        // (§8 invariant 6, "forwarding idempotence on bytes").
        let forwarded = Packet::message(data.to_vec(), *signature);
        let mut guard = recipient_entry.stream.lock().expect("connection mutex poisoned");
        let mut io = Blocking(&mut guard);
        zsm_packet::encode(&forwarded, &mut io)?;
        Ok(())
    }

    fn find_recipient(&self, identity: &Identity) -> Option<Arc<ConnectionEntry>> {
        self.all_tables.iter().find_map(|table| table.lock().expect("table mutex poisoned").get(identity).cloned())
    }

    fn send_status(&self, entry: &ConnectionEntry, status: Status) {
        let mut guard = entry.stream.lock().expect("connection mutex poisoned");
        let mut io = Blocking(&mut guard);
        if zsm_packet::encode(&Packet::status(status), &mut io).is_err() {
            warn!(self.logger, "courtesy status reply failed"; "peer" => entry.identity.to_hex(), "status" => %status);
        }
    }

    fn teardown(&mut self, token: Token, identity: &Identity, reply_status: Option<Status>) {
        let removed = self.table.lock().expect("table mutex poisoned").remove(identity);
        self.token_map.remove(&token);

        if let Some(entry) = removed {
            if let Some(status) = reply_status {
                self.send_status(&entry, status);
            }
            let mut guard = entry.stream.lock().expect("connection mutex poisoned");
            let _ = self.poll.registry().deregister(&mut *guard);
        }

        info!(self.logger, "connection closed"; "worker" => self.id, "peer" => identity.to_hex());
    }

    fn sweep_idle(&mut self) {
        let idle_timeout = self.idle_timeout;
        let expired: Vec<(Token, Identity)> = self
            .token_map
            .iter()
            .filter_map(|(token, identity)| {
                let entry = self.table.lock().expect("table mutex poisoned").get(identity).cloned()?;
                if entry.idle_for() > idle_timeout {
                    Some((*token, *identity))
                } else {
                    None
                }
            })
            .collect();

        for (token, identity) in expired {
            warn!(self.logger, "idle_timeout"; "worker" => self.id, "peer" => identity.to_hex());
            self.teardown(token, &identity, None);
        }
    }
}

fn packet_type_label(packet_type: zsm_common::PacketType) -> &'static str {
    use zsm_common::PacketType::*;
    match packet_type {
        Auth => "auth",
        Message => "message",
        UpdateMessage => "update_message",
        DeleteMessage => "delete_message",
    }
}
