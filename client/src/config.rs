use crate::error::ClientError;
use slog::warn;
use std::path::Path;
use zsm_common::Identity;
use zsm_crypto::IdentityKeys;

/// The client's immutable, process-lifetime configuration (§3 `[NEW]`, §6).
pub struct Config {
    pub keys: IdentityKeys,
    pub server_address: String,
    /// Observational only (§6 `[NEW]`): the client does not enforce its own
    /// idle timeout, only the relay does.
    pub idle_timeout_secs: Option<u64>,
    pub nickname: Option<String>,
}

/// Parses the `key=value` config file format described in §6, with a small
/// hand-rolled line parser matching the original's plain-text format
/// exactly (§4.4 `[NEW]` configuration loader).
///
/// Unknown keys log a WARN and are otherwise ignored (§8 invariant 8).
/// Missing or malformed required keys (`public_key`, `private_key`,
/// `server_address`) fail fast with a descriptive [`ClientError::Config`].
pub fn load(path: &Path, logger: &slog::Logger) -> Result<Config, ClientError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| ClientError::Config(format!("failed to read {}: {err}", path.display())))?;

    let mut public_key: Option<String> = None;
    let mut private_key: Option<String> = None;
    let mut server_address: Option<String> = None;
    let mut idle_timeout_secs: Option<u64> = None;
    let mut nickname: Option<String> = None;

    for (lineno, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(ClientError::Config(format!("{}:{}: not a key=value line", path.display(), lineno + 1)));
        };
        let key = key.trim();
        let value = value.trim().to_string();

        match key {
            "public_key" => public_key = Some(value),
            "private_key" => private_key = Some(value),
            "server_address" => server_address = Some(value),
            "idle_timeout_secs" => {
                idle_timeout_secs = Some(value.parse().map_err(|_| {
                    ClientError::Config(format!("idle_timeout_secs is not a valid integer: {value}"))
                })?)
            }
            "nickname" => nickname = Some(value),
            other => warn!(logger, "unrecognised config key"; "key" => other, "line" => lineno + 1),
        }
    }

    let private_key_hex = private_key.ok_or_else(|| ClientError::Config("missing required key: private_key".into()))?;
    let public_key_hex = public_key.ok_or_else(|| ClientError::Config("missing required key: public_key".into()))?;
    let server_address =
        server_address.ok_or_else(|| ClientError::Config("missing required key: server_address".into()))?;

    let private_key_bytes = hex::decode(&private_key_hex)
        .map_err(|err| ClientError::Config(format!("private_key is not valid hex: {err}")))?;
    if private_key_bytes.len() != zsm_crypto::SECRET_KEY_LEN {
        return Err(ClientError::Config(format!(
            "private_key must be {} hex chars, got {}",
            zsm_crypto::SECRET_KEY_LEN * 2,
            private_key_hex.len()
        )));
    }
    let mut private_key_array = [0u8; 64];
    private_key_array.copy_from_slice(&private_key_bytes);
    let keys = IdentityKeys::from_expanded_secret(&private_key_array)
        .map_err(|err| ClientError::Config(format!("private_key is invalid: {err}")))?;

    let declared_public: Identity =
        public_key_hex.parse().map_err(|err| ClientError::Config(format!("public_key is invalid hex: {err}")))?;
    if declared_public != keys.identity() {
        return Err(ClientError::Config("public_key does not match the derived public half of private_key".into()));
    }

    Ok(Config { keys, server_address, idle_timeout_secs, nickname })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn discard_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn round_trips_a_well_formed_config() {
        let keys = IdentityKeys::generate();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zen.conf");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "public_key={}", keys.identity().to_hex()).unwrap();
        writeln!(file, "private_key={}", hex::encode(keys.to_expanded_secret())).unwrap();
        writeln!(file, "server_address=example.org").unwrap();
        writeln!(file, "mystery_setting=123").unwrap();
        drop(file);

        let config = load(&path, &discard_logger()).unwrap();
        assert_eq!(config.keys.identity(), keys.identity());
        assert_eq!(config.server_address, "example.org");
    }

    #[test]
    fn rejects_mismatched_public_key() {
        let keys = IdentityKeys::generate();
        let other = IdentityKeys::generate();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zen.conf");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "public_key={}", other.identity().to_hex()).unwrap();
        writeln!(file, "private_key={}", hex::encode(keys.to_expanded_secret())).unwrap();
        writeln!(file, "server_address=example.org").unwrap();
        drop(file);

        assert!(load(&path, &discard_logger()).is_err());
    }

    #[test]
    fn rejects_missing_required_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zen.conf");
        std::fs::write(&path, "server_address=example.org\n").unwrap();
        assert!(load(&path, &discard_logger()).is_err());
    }
}
