#![forbid(unsafe_code)]

//! `zen`: the client half of the zsm instant-messaging system (§3, §4.4).
//!
//! This crate wires together `zsm-crypto` and `zsm-packet` with a
//! persistence layer, a notification sink, a terminal UI and a key
//! directory — each a small trait with one concrete default implementation,
//! so `zsm-client` never hard-codes SQLite, stdout or a particular
//! notification mechanism into `ClientSession` itself.

mod config;
mod error;
mod key_directory;
mod notifier;
mod session;
mod store;
mod ui;

pub use config::{load as load_config, Config};
pub use error::ClientError;
pub use key_directory::{KeyDirectory, LocalKeyDirectory};
pub use notifier::{LoggingNotifier, Notifier};
pub use session::ClientSession;
pub use store::{LocalMessage, SqliteStore, Store};
pub use ui::{LineUi, SendCommand, Ui};
