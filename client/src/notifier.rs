use slog::info;
use zsm_common::Identity;

/// The client's notification boundary (§4.4 `[NEW]`): called once per
/// successfully decrypted inbound message, decoupled from both the UI and
/// the store so a desktop/system-tray notifier could replace the default
/// without touching `ClientSession`.
pub trait Notifier {
    fn notify(&self, sender: &Identity, sender_label: &str, preview: &str);
}

/// Default [`Notifier`]: logs an INFO line. Matches the teacher's habit of
/// routing user-facing events through the structured logger rather than
/// printing directly, so a notification survives in the log file even when
/// the terminal UI isn't watched.
pub struct LoggingNotifier {
    logger: slog::Logger,
}

impl LoggingNotifier {
    pub fn new(logger: slog::Logger) -> Self {
        LoggingNotifier { logger }
    }
}

impl Notifier for LoggingNotifier {
    fn notify(&self, sender: &Identity, sender_label: &str, preview: &str) {
        info!(self.logger, "new message"; "from" => sender_label, "identity" => sender.to_hex(), "preview" => preview);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn logging_notifier_does_not_panic() {
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let notifier = LoggingNotifier::new(logger);
        notifier.notify(&Identity::from_bytes([1u8; 32]), "alice", "hi");
    }
}
