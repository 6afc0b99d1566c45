#![forbid(unsafe_code)]

//! Deterministic, length-prefixed framing for the zsm wire protocol.
//!
//! This crate owns exactly one concern: turning a [`Packet`] into bytes and
//! back, with no opinion about sockets, threads or cryptography. The server
//! and client both build on top of it; see `zsm-crypto` for signing and
//! encryption and `zmr`/`zen` for where the bytes actually travel.

mod codec;

pub use codec::{decode, encode, CourtesyReply, PacketError};

use zsm_common::{PacketType, Status};

/// Maximum size in bytes of a packet's `data` field (§3).
pub const MAX_DATA_LENGTH: usize = 8192;

/// Size in bytes of the Ed25519 detached signature trailing every
/// data-bearing packet.
pub const SIGNATURE_LEN: usize = 64;

/// Size in bytes of the wire header: 1-byte type, 4-byte little-endian
/// length.
pub const HEADER_LEN: usize = 5;

/// An all-zero signature, used on server-originated packets that carry no
/// user payload (§4.2) and therefore are never verified.
pub const ZERO_SIGNATURE: [u8; SIGNATURE_LEN] = [0u8; SIGNATURE_LEN];

/// The unit of the wire protocol (§3).
///
/// `Signed` covers the four client/peer-originated kinds, which always carry
/// `data` and a 64-byte signature over that data. `StatusOnly` covers every
/// server-originated response: the wire's type byte is overloaded with the
/// [`Status`] value itself, and no data or signature follows (§4.1, §9).
#[derive(Clone, Eq, PartialEq)]
pub enum Packet {
    Signed {
        packet_type: PacketType,
        data: Vec<u8>,
        signature: [u8; SIGNATURE_LEN],
    },
    StatusOnly(Status),
}

impl Packet {
    pub fn auth(data: Vec<u8>, signature: [u8; SIGNATURE_LEN]) -> Self {
        Packet::Signed { packet_type: PacketType::Auth, data, signature }
    }

    pub fn message(data: Vec<u8>, signature: [u8; SIGNATURE_LEN]) -> Self {
        Packet::Signed { packet_type: PacketType::Message, data, signature }
    }

    pub fn status(status: Status) -> Self {
        Packet::StatusOnly(status)
    }

    /// The packet's `data` field, if this is a [`Packet::Signed`] packet.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Packet::Signed { data, .. } => Some(data),
            Packet::StatusOnly(_) => None,
        }
    }

    pub fn signature(&self) -> Option<&[u8; SIGNATURE_LEN]> {
        match self {
            Packet::Signed { signature, .. } => Some(signature),
            Packet::StatusOnly(_) => None,
        }
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Packet::Signed { packet_type, data, .. } => f
                .debug_struct("Packet::Signed")
                .field("packet_type", packet_type)
                .field("data_len", &data.len())
                .finish(),
            Packet::StatusOnly(status) => f.debug_tuple("Packet::StatusOnly").field(status).finish(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_signed_packet() {
        let packet = Packet::message(vec![1, 2, 3, 4], [9u8; SIGNATURE_LEN]);
        let mut buf = Vec::new();
        encode(&packet, &mut buf).unwrap();
        let decoded = decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(packet, decoded);
    }

    #[test]
    fn round_trips_status_only_packet() {
        let packet = Packet::status(Status::UnknownUser);
        let mut buf = Vec::new();
        encode(&packet, &mut buf).unwrap();
        let decoded = decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(packet, decoded);
    }

    #[test]
    fn rejects_oversize_data_before_touching_the_socket() {
        let packet = Packet::message(vec![0u8; MAX_DATA_LENGTH + 1], ZERO_SIGNATURE);
        let mut buf = Vec::new();
        let err = encode(&packet, &mut buf).unwrap_err();
        assert!(matches!(err, PacketError::TooLong));
        assert!(buf.is_empty(), "no bytes should reach the writer on a rejected encode");
    }
}
