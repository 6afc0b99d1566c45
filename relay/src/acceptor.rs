use crate::connection::ConnectionEntry;
use crate::error::RelayError;
use crate::worker::{Table, Worker, MAX_CLIENTS_PER_THREAD};
use slog::{error, info};
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use zsm_common::Identity;

struct WorkerHandle {
    table: Table,
    sender: crossbeam_channel::Sender<Arc<ConnectionEntry>>,
}

struct Shared {
    workers: Vec<WorkerHandle>,
    /// Process-wide mutex serialising the admission path: computing the
    /// round-robin index, checking the chosen worker's capacity, and
    /// inserting the new entry all happen while this is held (§4.3, §5).
    admission: Mutex<usize>,
    logger: slog::Logger,
}

/// Owns the listening socket and the vector of workers (§9 "Global mutable
/// state"). Runs the blocking accept loop, spawning one short-lived thread
/// per inbound connection to perform the synchronous handshake so a slow or
/// hostile handshake never stalls `accept()` for everyone else.
pub struct Acceptor {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl Acceptor {
    pub fn bind(port: u16, n_workers: usize, idle_timeout: Duration, logger: slog::Logger) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;

        let tables: Vec<Table> = (0..n_workers).map(|_| Arc::new(Mutex::new(HashMap::new()))).collect();
        let mut workers = Vec::with_capacity(n_workers);

        for (id, table) in tables.iter().cloned().enumerate() {
            let (sender, receiver) = crossbeam_channel::unbounded();
            let worker_logger = logger.new(slog::o!("worker" => id));
            let worker = Worker::new(id, receiver, table.clone(), tables.clone(), idle_timeout, worker_logger)?;
            thread::Builder::new()
                .name(format!("zmr-worker-{id}"))
                .spawn(move || worker.run())
                .expect("failed to spawn worker thread");
            workers.push(WorkerHandle { table, sender });
        }

        info!(logger, "relay listening"; "port" => port, "workers" => n_workers);

        Ok(Acceptor { listener, shared: Arc::new(Shared { workers, admission: Mutex::new(0), logger }) })
    }

    /// The bound local address — mainly useful in tests that bind port 0
    /// and need the OS-assigned port back.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Blocks forever, accepting connections and handing each off to a
    /// handshake thread.
    pub fn run(self) -> std::io::Result<()> {
        for incoming in self.listener.incoming() {
            let stream = match incoming {
                Ok(stream) => stream,
                Err(err) => {
                    error!(self.shared.logger, "accept failed"; "error" => %err);
                    continue;
                }
            };
            let shared = self.shared.clone();
            thread::spawn(move || {
                if let Err(err) = handle_connection(stream, &shared) {
                    error!(shared.logger, "connection setup failed"; "error" => %err);
                }
            });
        }
        Ok(())
    }
}

fn handle_connection(mut stream: std::net::TcpStream, shared: &Shared) -> Result<(), RelayError> {
    let identity = match crate::handshake::perform(&mut stream, &shared.logger) {
        Ok(identity) => identity,
        Err(_) => return Ok(()), // handshake module already logged and/or replied; socket is dropped here
    };

    stream.set_nonblocking(true)?;
    let mio_stream = mio::net::TcpStream::from_std(stream);

    match admit(shared, identity, mio_stream) {
        Ok(()) => Ok(()),
        Err(RelayError::WorkerFull) => {
            info!(shared.logger, "connection rejected: worker table full"; "peer" => identity.to_hex());
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn admit(shared: &Shared, identity: Identity, stream: mio::net::TcpStream) -> Result<(), RelayError> {
    let mut counter = shared.admission.lock().expect("admission mutex poisoned");
    let idx = *counter % shared.workers.len();
    *counter = counter.wrapping_add(1);

    let worker = &shared.workers[idx];
    let mut table = worker.table.lock().expect("table mutex poisoned");
    if table.len() >= MAX_CLIENTS_PER_THREAD {
        return Err(RelayError::WorkerFull);
    }

    let entry = Arc::new(ConnectionEntry::new(identity, stream));
    table.insert(identity, entry.clone());
    drop(table);

    let _ = worker.sender.send(entry);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn identity_for(i: u32) -> Identity {
        let mut bytes = [0u8; 32];
        bytes[28..].copy_from_slice(&i.to_be_bytes());
        Identity::from_bytes(bytes)
    }

    /// §8 invariant 7: with a single worker of capacity `MAX_CLIENTS_PER_THREAD`,
    /// the (cap + 1)th simultaneous connection is refused. Exercises `admit`
    /// directly against a bare `Shared`, reusing one real socket (cloned) for
    /// every admitted identity so the test doesn't need 1025 live TCP peers.
    #[test]
    fn admission_cap_rejects_the_cap_plus_one_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let base_stream = std::net::TcpStream::connect(addr).unwrap();
        let _peer = listener.accept().unwrap();

        let table: Table = Arc::new(Mutex::new(HashMap::new()));
        let (sender, _receiver) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            workers: vec![WorkerHandle { table, sender }],
            admission: Mutex::new(0),
            logger: slog::Logger::root(slog::Discard, slog::o!()),
        });

        for i in 0..MAX_CLIENTS_PER_THREAD as u32 {
            let stream = mio::net::TcpStream::from_std(base_stream.try_clone().unwrap());
            admit(&shared, identity_for(i), stream).expect("within capacity");
        }

        let stream = mio::net::TcpStream::from_std(base_stream.try_clone().unwrap());
        let result = admit(&shared, identity_for(MAX_CLIENTS_PER_THREAD as u32), stream);
        assert!(matches!(result, Err(RelayError::WorkerFull)));
    }
}
