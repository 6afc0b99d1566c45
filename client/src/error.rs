use thiserror::Error;

/// The client's error taxonomy (SPEC_FULL.md §7 `[NEW]`).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Packet(#[from] zsm_packet::PacketError),

    #[error(transparent)]
    Crypto(#[from] zsm_crypto::CryptoError),

    #[error("local store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("relay closed the connection")]
    ClosedConnection,

    #[error("server reported an error: {0}")]
    ServerError(zsm_common::Status),
}
