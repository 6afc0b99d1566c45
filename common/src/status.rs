use std::fmt;

/// The one-byte `type` field of a packet header (§3, §6), for the four
/// client/peer-originated kinds that always carry `data` + `signature`.
///
/// Server-originated packets never write a literal `Error`/`Info` tag into
/// this byte; instead they overload the same byte position with a
/// [`Status`] value directly (SPEC_FULL.md §9, "Status field vs type field"
/// resolution) — a status-bearing packet is recognised because its raw byte
/// does not decode as one of the four variants here. `zsm_packet::Packet`
/// models this as two disjoint cases rather than six overlapping ones.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PacketType {
    Auth = 1,
    Message = 2,
    UpdateMessage = 3,
    DeleteMessage = 4,
}

impl PacketType {
    pub fn from_u8(v: u8) -> Option<Self> {
        use PacketType::*;
        Some(match v {
            1 => Auth,
            2 => Message,
            3 => UpdateMessage,
            4 => DeleteMessage,
            _ => return None,
        })
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Status codes carried in the overloaded type byte of server-originated
/// `Error`/`Info` packets (§6). Numbered sequentially from a base past the
/// packet-type range so the two enumerations never collide on the wire even
/// though they share the header's type byte — see DESIGN.md for the pinned
/// table referenced by SPEC_FULL.md §6.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Status {
    Success = 10,
    InvalidType = 11,
    InvalidLength = 12,
    TooLong = 13,
    ReadingSocket = 14,
    WritingSocket = 15,
    UnknownUser = 16,
    MemoryAllocation = 17,
    ErrorEncrypt = 18,
    ErrorDecrypt = 19,
    ErrorAuthenticate = 20,
    ErrorIntegrity = 21,
    Unauthorised = 22,
    Authorised = 23,
    ClosedConnection = 24,
}

impl Status {
    pub fn from_u8(v: u8) -> Option<Self> {
        use Status::*;
        Some(match v {
            10 => Success,
            11 => InvalidType,
            12 => InvalidLength,
            13 => TooLong,
            14 => ReadingSocket,
            15 => WritingSocket,
            16 => UnknownUser,
            17 => MemoryAllocation,
            18 => ErrorEncrypt,
            19 => ErrorDecrypt,
            20 => ErrorAuthenticate,
            21 => ErrorIntegrity,
            22 => Unauthorised,
            23 => Authorised,
            24 => ClosedConnection,
            _ => return None,
        })
    }

    /// Short textual description suitable for the ERROR-severity log line
    /// mandated by SPEC_FULL.md §7.
    pub fn description(self) -> &'static str {
        use Status::*;
        match self {
            Success => "success",
            InvalidType => "invalid packet type",
            InvalidLength => "invalid packet length",
            TooLong => "packet exceeds maximum data length",
            ReadingSocket => "error reading from socket",
            WritingSocket => "error writing to socket",
            UnknownUser => "recipient is not currently connected",
            MemoryAllocation => "memory allocation failure",
            ErrorEncrypt => "encryption failed",
            ErrorDecrypt => "decryption failed",
            ErrorAuthenticate => "authentication failed",
            ErrorIntegrity => "signature verification failed",
            Unauthorised => "handshake rejected",
            Authorised => "handshake accepted",
            ClosedConnection => "connection closed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn packet_type_round_trips() {
        for raw in 1..=4u8 {
            let ty = PacketType::from_u8(raw).unwrap();
            assert_eq!(ty as u8, raw);
        }
        assert!(PacketType::from_u8(0).is_none());
        assert!(PacketType::from_u8(5).is_none());
    }

    #[test]
    fn status_round_trips() {
        for raw in 10..=24u8 {
            let status = Status::from_u8(raw).unwrap();
            assert_eq!(status as u8, raw);
        }
    }
}
