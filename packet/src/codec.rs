use crate::{Packet, HEADER_LEN, MAX_DATA_LENGTH, SIGNATURE_LEN, ZERO_SIGNATURE};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use zsm_common::{PacketType, Status};

/// Outcome of the codec's best-effort courtesy reply (§4.1, §7): a
/// malformed header or oversize length gets one attempted ERROR/status
/// packet back to the sender before the original error is returned to the
/// caller. The caller is expected to log [`CourtesyReply::Failed`] at ERROR
/// severity; a failed courtesy reply never changes the control-flow outcome
/// of the call that attempted it.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CourtesyReply {
    /// No courtesy reply applies to this error (e.g. the connection is
    /// already known to be closed).
    NotAttempted,
    Sent,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("packet data exceeds MAX_DATA_LENGTH ({MAX_DATA_LENGTH})")]
    TooLong,

    #[error("unrecognised packet type byte")]
    InvalidType { courtesy: CourtesyReply },

    #[error("peer closed the connection")]
    ClosedConnection,

    #[error("error reading from socket: {source}")]
    ReadingSocket {
        #[source]
        source: io::Error,
        courtesy: CourtesyReply,
    },

    #[error("error writing to socket: {source}")]
    WritingSocket {
        #[source]
        source: io::Error,
    },
}

/// Encodes `packet` onto `writer`.
///
/// Oversize `data` is rejected before any bytes reach `writer` (§8 invariant
/// 2). Otherwise this performs exactly one header-sized write followed by,
/// for [`Packet::Signed`] packets with non-empty data, one payload-sized
/// write covering `data` then the 64-byte signature — two syscalls total,
/// matching the "minimise syscalls" rule of §4.1.
pub fn encode<W: Write>(packet: &Packet, writer: &mut W) -> Result<(), PacketError> {
    let (type_byte, data, signature): (u8, &[u8], &[u8; SIGNATURE_LEN]) = match packet {
        Packet::Signed { packet_type, data, signature } => {
            if data.len() > MAX_DATA_LENGTH {
                return Err(PacketError::TooLong);
            }
            (*packet_type as u8, data.as_slice(), signature)
        }
        Packet::StatusOnly(status) => (*status as u8, &[], &ZERO_SIGNATURE),
    };

    let mut header = [0u8; HEADER_LEN];
    header[0] = type_byte;
    (&mut header[1..]).write_u32::<LittleEndian>(data.len() as u32).expect("header buffer is fixed-size");
    writer.write_all(&header).map_err(|source| PacketError::WritingSocket { source })?;

    if !data.is_empty() {
        let mut payload = Vec::with_capacity(data.len() + SIGNATURE_LEN);
        payload.extend_from_slice(data);
        payload.extend_from_slice(signature);
        writer.write_all(&payload).map_err(|source| PacketError::WritingSocket { source })?;
    }

    Ok(())
}

/// Decodes one [`Packet`] from `stream`, attempting a courtesy reply back
/// over the same stream on a malformed header (§4.1, §7).
///
/// `stream` must implement both `Read` and `Write`: the read side consumes
/// the packet, the write side is used solely for the best-effort courtesy
/// reply and is never touched on the happy path.
pub fn decode<S: Read + Write>(stream: &mut S) -> Result<Packet, PacketError> {
    let mut header = [0u8; HEADER_LEN];
    if let Err(source) = stream.read_exact(&mut header) {
        return match source.kind() {
            io::ErrorKind::UnexpectedEof => Err(PacketError::ClosedConnection),
            _ => Err(PacketError::ReadingSocket { source, courtesy: CourtesyReply::NotAttempted }),
        };
    }

    let type_byte = header[0];
    let length = (&header[1..]).read_u32::<LittleEndian>().expect("header buffer is fixed-size") as usize;

    if length > MAX_DATA_LENGTH {
        // The header itself decoded fine, so a courtesy reply can still go
        // out on this stream before we report TooLong to the caller.
        let _ = encode(&Packet::StatusOnly(Status::TooLong), stream);
        return Err(PacketError::TooLong);
    }

    if let Some(packet_type) = PacketType::from_u8(type_byte) {
        if length == 0 {
            return Ok(Packet::Signed { packet_type, data: Vec::new(), signature: ZERO_SIGNATURE });
        }

        let mut payload = vec![0u8; length + SIGNATURE_LEN];
        if let Err(source) = stream.read_exact(&mut payload) {
            let courtesy = send_courtesy(stream, Status::ReadingSocket);
            return Err(PacketError::ReadingSocket { source, courtesy });
        }

        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&payload[length..]);
        let data = payload[..length].to_vec();
        return Ok(Packet::Signed { packet_type, data, signature });
    }

    if let Some(status) = Status::from_u8(type_byte) {
        return Ok(Packet::StatusOnly(status));
    }

    let courtesy = send_courtesy(stream, Status::InvalidType);
    Err(PacketError::InvalidType { courtesy })
}

fn send_courtesy<S: Write>(stream: &mut S, status: Status) -> CourtesyReply {
    match encode(&Packet::StatusOnly(status), stream) {
        Ok(()) => CourtesyReply::Sent,
        Err(_) => CourtesyReply::Failed,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    /// A `Read + Write` double so tests can exercise the courtesy-reply path
    /// without a real socket.
    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn oversize_length_gets_a_courtesy_reply_and_too_long_error() {
        let mut header = [0u8; HEADER_LEN];
        header[0] = PacketType::Message as u8;
        (&mut header[1..]).write_u32::<LittleEndian>(9000).unwrap();

        let mut stream = MockStream { input: Cursor::new(header.to_vec()), output: Vec::new() };
        let err = decode(&mut stream).unwrap_err();
        assert!(matches!(err, PacketError::TooLong));

        let reply = decode(&mut MockStream { input: Cursor::new(stream.output), output: Vec::new() }).unwrap();
        assert_eq!(reply, Packet::status(Status::TooLong));
    }

    #[test]
    fn unknown_type_byte_gets_a_courtesy_reply() {
        let mut header = [0u8; HEADER_LEN];
        header[0] = 200; // neither a PacketType nor a Status
        let mut stream = MockStream { input: Cursor::new(header.to_vec()), output: Vec::new() };
        let err = decode(&mut stream).unwrap_err();
        assert!(matches!(err, PacketError::InvalidType { courtesy: CourtesyReply::Sent }));
    }

    #[test]
    fn short_header_is_closed_connection() {
        let mut stream = MockStream { input: Cursor::new(vec![1, 2]), output: Vec::new() };
        let err = decode(&mut stream).unwrap_err();
        assert!(matches!(err, PacketError::ClosedConnection));
    }

    #[test]
    fn short_payload_is_reading_socket_error() {
        let mut header = [0u8; HEADER_LEN];
        header[0] = PacketType::Message as u8;
        (&mut header[1..]).write_u32::<LittleEndian>(10).unwrap();
        let mut body = header.to_vec();
        body.extend_from_slice(&[0u8; 5]); // far short of 10 + 64
        let mut stream = MockStream { input: Cursor::new(body), output: Vec::new() };
        let err = decode(&mut stream).unwrap_err();
        assert!(matches!(err, PacketError::ReadingSocket { .. }));
    }
}
