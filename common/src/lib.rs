#![forbid(unsafe_code)]

//! Shared value types and process utilities used by every other `zsm` crate:
//! the [`Identity`] newtype, the wire-visible [`PacketType`]/[`Status`]
//! enumerations, structured logging setup, and data-directory resolution.

pub mod identity;
pub mod logging;
pub mod paths;
pub mod status;

pub use identity::{Identity, IdentityParseError, IDENTITY_LEN};
pub use paths::{app_data_dir, PathError};
pub use status::{PacketType, Status};
