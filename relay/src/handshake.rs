use crate::error::RelayError;
use rand::rngs::OsRng;
use rand::RngCore;
use slog::{info, warn};
use std::net::TcpStream;
use zsm_common::{Identity, Status};
use zsm_packet::{Packet, PacketError};

/// Runs the server-driven three-packet challenge-response handshake (§4.3)
/// over a still-blocking, not-yet-registered `TcpStream`.
///
/// Returns the client's authenticated [`Identity`] on success. Every failure
/// path — wrong packet type, bad signature, or a socket error at any step —
/// results in the connection being closed by the caller; a socket error
/// closes silently (no courtesy reply is attempted once the stream itself is
/// unreliable).
pub fn perform(stream: &mut TcpStream, logger: &slog::Logger) -> Result<Identity, RelayError> {
    let mut challenge = [0u8; 32];
    OsRng.fill_bytes(&mut challenge);

    let auth_challenge = Packet::auth(challenge.to_vec(), zsm_packet::ZERO_SIGNATURE);
    zsm_packet::encode(&auth_challenge, stream)?;

    let response = match zsm_packet::decode(stream) {
        Ok(packet) => packet,
        Err(PacketError::ClosedConnection) => return Err(RelayError::Packet(PacketError::ClosedConnection)),
        Err(err) => return Err(RelayError::Packet(err)),
    };

    let (data, signature) = match response {
        Packet::Signed { packet_type: zsm_common::PacketType::Auth, data, signature } => (data, signature),
        _ => {
            reject(stream, logger, "wrong packet type at handshake step 2");
            return Err(RelayError::UnexpectedType);
        }
    };

    let identity = match Identity::try_from(data.as_slice()) {
        Ok(identity) => identity,
        Err(_) => {
            reject(stream, logger, "handshake public key is not 32 bytes");
            return Err(RelayError::UnexpectedType);
        }
    };

    match zsm_crypto::verify(&challenge, &signature, &identity) {
        Ok(()) => {
            let accepted = Packet::status(Status::Authorised);
            zsm_packet::encode(&accepted, stream)?;
            info!(logger, "handshake authorised"; "peer" => identity.to_hex());
            Ok(identity)
        }
        Err(_) => {
            reject(stream, logger, "challenge signature did not verify");
            Err(RelayError::Crypto(zsm_crypto::CryptoError::Integrity))
        }
    }
}

fn reject(stream: &mut TcpStream, logger: &slog::Logger, reason: &str) {
    warn!(logger, "handshake rejected"; "reason" => reason);
    let unauthorised = Packet::status(Status::Unauthorised);
    let _ = zsm_packet::encode(&unauthorised, stream);
}
