use crate::error::ClientError;
use crate::key_directory::KeyDirectory;
use crate::notifier::Notifier;
use crate::store::{LocalMessage, Store};
use crate::ui::Ui;
use slog::{error, info, warn};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use zsm_common::{Identity, PacketType, Status};
use zsm_crypto::IdentityKeys;
use zsm_packet::Packet;

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock is before the epoch").as_secs()
}

/// Runs the client side of the three-packet handshake (§4.3) over a
/// just-connected, still-blocking `TcpStream`.
fn authenticate(stream: &mut TcpStream, keys: &IdentityKeys) -> Result<(), ClientError> {
    let challenge_packet = zsm_packet::decode(stream)?;
    let challenge = match challenge_packet {
        Packet::Signed { packet_type: PacketType::Auth, data, .. } => data,
        _ => return Err(ClientError::ServerError(Status::Unauthorised)),
    };

    let signature = zsm_crypto::sign(&challenge, keys);
    let reply = Packet::auth(keys.identity().as_bytes().to_vec(), signature);
    zsm_packet::encode(&reply, stream)?;

    match zsm_packet::decode(stream)? {
        Packet::StatusOnly(Status::Authorised) => Ok(()),
        Packet::StatusOnly(status) => Err(ClientError::ServerError(status)),
        _ => Err(ClientError::ServerError(Status::Unauthorised)),
    }
}

/// A live, authenticated connection to one relay (§3 "Client session",
/// §4.4). Owns the write half directly for the send path; the receive task
/// gets its own cloned handle to the same socket.
pub struct ClientSession<S: Store> {
    keys: IdentityKeys,
    stream: TcpStream,
    store: Arc<S>,
    logger: slog::Logger,
}

impl<S: Store + Send + Sync + 'static> ClientSession<S> {
    /// Connects to `server_address` and runs the handshake (§4.4 "Startup").
    pub fn connect(
        keys: IdentityKeys,
        server_address: &str,
        store: Arc<S>,
        logger: slog::Logger,
    ) -> Result<Self, ClientError> {
        let mut stream = TcpStream::connect(server_address)?;
        authenticate(&mut stream, &keys)?;
        info!(logger, "authenticated with relay"; "server" => server_address, "identity" => keys.identity().to_hex());
        Ok(ClientSession { keys, stream, store, logger })
    }

    pub fn identity(&self) -> Identity {
        self.keys.identity()
    }

    /// Spawns the dedicated receive task (§4.4 "Startup", "Receive task").
    /// Returns immediately; the caller keeps driving the UI loop on its own
    /// thread, per §5's thread layout.
    pub fn spawn_receive_task<N, U>(
        &self,
        notifier: Arc<N>,
        ui: Arc<Mutex<U>>,
        selected: Arc<Mutex<Option<Identity>>>,
    ) -> Result<std::thread::JoinHandle<()>, ClientError>
    where
        N: Notifier + Send + Sync + 'static,
        U: Ui + Send + 'static,
    {
        let mut reader = self.stream.try_clone()?;
        let store = Arc::clone(&self.store);
        let keys = self.keys.clone();
        let logger = self.logger.clone();

        Ok(std::thread::spawn(move || {
            receive_loop(&mut reader, &keys, &store, notifier.as_ref(), &ui, &selected, &logger);
        }))
    }

    /// The send path (§4.4 "Send path"): obtains the send key (cache-or-derive),
    /// encrypts, signs and writes the MESSAGE packet, then persists locally.
    /// Errors from encryption are surfaced via `ui` without tearing the
    /// connection down; a write failure propagates and does tear it down,
    /// matching step 4's "unless the write itself failed".
    pub fn send<U: Ui>(&mut self, recipient: Identity, text: &str, ui: &mut U) -> Result<(), ClientError> {
        let send_key = match zsm_crypto::derive_or_cached(&self.keys, &recipient, self.store.as_ref()) {
            Ok(keys) => keys.send,
            Err(err) => {
                ui.set_status(&format!("could not establish a session key: {err}"));
                return Ok(());
            }
        };

        let creation = now_unix();
        let payload =
            match zsm_crypto::encrypt_message(&send_key, self.keys.identity(), recipient, text.as_bytes(), creation) {
                Ok(payload) => payload,
                Err(err) => {
                    ui.set_status(&format!("encryption failed: {err}"));
                    return Ok(());
                }
            };

        let data = payload.encode();
        let signature = zsm_crypto::sign(&data, &self.keys);
        let packet = Packet::message(data, signature);
        zsm_packet::encode(&packet, &mut self.stream)?;

        self.store.append_message(&LocalMessage {
            author: self.keys.identity(),
            recipient,
            content: text.to_string(),
            timestamp: creation,
        })?;

        Ok(())
    }

    /// Resolves a UI-typed identifier through `directory`, reporting an
    /// unknown nickname via the status line rather than erroring the whole
    /// session.
    pub fn resolve<D: KeyDirectory, U: Ui>(&self, directory: &D, identifier: &str, ui: &mut U) -> Option<Identity> {
        match directory.resolve(identifier) {
            Ok(Some(identity)) => Some(identity),
            Ok(None) => {
                ui.set_status(&format!("unknown recipient: {identifier}"));
                None
            }
            Err(err) => {
                ui.set_status(&format!("key directory error: {err}"));
                None
            }
        }
    }
}

/// The receive task's main loop (§4.4 "Receive task"): decode, verify,
/// decrypt, persist, notify, and refresh the UI when the sender matches the
/// selected conversation. A server ERROR surfaces to the status line and
/// the loop continues; a closed connection shuts the UI down and returns.
fn receive_loop<S, N, U>(
    stream: &mut TcpStream,
    keys: &IdentityKeys,
    store: &Arc<S>,
    notifier: &N,
    ui: &Arc<Mutex<U>>,
    selected: &Arc<Mutex<Option<Identity>>>,
    logger: &slog::Logger,
) where
    S: Store,
    N: Notifier,
    U: Ui,
{
    loop {
        let packet = match zsm_packet::decode(stream) {
            Ok(packet) => packet,
            Err(zsm_packet::PacketError::ClosedConnection) => {
                warn!(logger, "relay closed the connection");
                ui.lock().expect("ui mutex poisoned").set_status("disconnected from relay");
                // §4.4 step 4 / §7: the receive task exits and the process
                // follows — the main thread is blocked on stdin and would
                // otherwise never notice the relay is gone.
                std::process::exit(1);
            }
            Err(err) => {
                error!(logger, "error reading from relay"; "error" => %err);
                ui.lock().expect("ui mutex poisoned").set_status(&format!("connection error: {err}"));
                std::process::exit(1);
            }
        };

        match packet {
            Packet::Signed { packet_type: PacketType::Message, data, signature } => {
                if let Err(err) = handle_message(&data, &signature, keys, store, notifier, ui, selected, logger) {
                    warn!(logger, "dropping malformed or unverifiable message"; "error" => %err);
                }
            }
            Packet::StatusOnly(status) => {
                warn!(logger, "server reported an error"; "status" => %status);
                ui.lock().expect("ui mutex poisoned").set_status(&format!("server: {status}"));
            }
            other => {
                warn!(logger, "ignoring unexpected packet on the receive path"; "packet" => ?other);
            }
        }
    }
}

fn handle_message<S, N, U>(
    data: &[u8],
    signature: &[u8; zsm_packet::SIGNATURE_LEN],
    keys: &IdentityKeys,
    store: &Arc<S>,
    notifier: &N,
    ui: &Arc<Mutex<U>>,
    selected: &Arc<Mutex<Option<Identity>>>,
    logger: &slog::Logger,
) -> Result<(), ClientError>
where
    S: Store,
    N: Notifier,
    U: Ui,
{
    let payload = zsm_crypto::MessagePayload::decode(data)?;
    zsm_crypto::verify(data, signature, &payload.sender)?;

    let receive_key = zsm_crypto::derive_or_cached(keys, &payload.sender, store.as_ref())?.receive;
    let plaintext = zsm_crypto::decrypt_message(&receive_key, &payload)?;
    let text = String::from_utf8_lossy(&plaintext).into_owned();

    store.append_message(&LocalMessage {
        author: payload.sender,
        recipient: payload.recipient,
        content: text.clone(),
        timestamp: payload.creation,
    })?;

    let label = store.nickname(&payload.sender)?.unwrap_or_else(|| payload.sender.to_hex());
    notifier.notify(&payload.sender, &label, &text);

    info!(logger, "message received"; "from" => payload.sender.to_hex());

    let is_selected = *selected.lock().expect("selected-peer mutex poisoned") == Some(payload.sender);
    if is_selected {
        ui.lock().expect("ui mutex poisoned").render_message(&label, payload.creation, &text);
    }

    Ok(())
}
