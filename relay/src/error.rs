use thiserror::Error;
use zsm_common::Status;

/// The relay's error taxonomy (SPEC_FULL.md §7 `[NEW]`): every variant maps
/// 1:1 onto a wire status code via [`RelayError::to_status`].
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Packet(#[from] zsm_packet::PacketError),

    #[error(transparent)]
    Crypto(#[from] zsm_crypto::CryptoError),

    #[error("worker table is full")]
    WorkerFull,

    #[error("recipient is not currently connected")]
    UnknownRecipient,

    #[error("unexpected packet type for this context")]
    UnexpectedType,

    #[error("connection idle past the configured timeout")]
    IdleTimeout,
}

impl RelayError {
    pub fn to_status(&self) -> Status {
        match self {
            RelayError::Io(_) => Status::ReadingSocket,
            RelayError::Packet(zsm_packet::PacketError::TooLong) => Status::TooLong,
            RelayError::Packet(zsm_packet::PacketError::InvalidType { .. }) => Status::InvalidType,
            RelayError::Packet(zsm_packet::PacketError::ClosedConnection) => Status::ClosedConnection,
            RelayError::Packet(zsm_packet::PacketError::ReadingSocket { .. }) => Status::ReadingSocket,
            RelayError::Packet(zsm_packet::PacketError::WritingSocket { .. }) => Status::WritingSocket,
            RelayError::Crypto(crypto) => crypto.to_status(),
            RelayError::WorkerFull => Status::MemoryAllocation,
            RelayError::UnknownRecipient => Status::UnknownUser,
            RelayError::UnexpectedType => Status::InvalidType,
            RelayError::IdleTimeout => Status::ClosedConnection,
        }
    }

    /// `true` if this error tears the connection down (§4.3 state machine);
    /// `false` if the worker should send a courtesy reply and stay `Active`.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RelayError::UnknownRecipient | RelayError::UnexpectedType)
    }
}
