use std::path::PathBuf;

/// Resolves `~/.local/share/zsm/<app>/`, creating it if necessary.
///
/// Uses `dirs::data_dir()` (XDG_DATA_HOME on Linux) rather than hardcoding
/// `~/.local/share`, matching the convention the rest of the ecosystem's
/// config-path helpers follow, while the default documented in SPEC_FULL.md
/// §6 (`~/.local/share/zsm/zen/`) is exactly what that resolves to on a
/// stock Linux XDG setup.
pub fn app_data_dir(app: &str) -> Result<PathBuf, PathError> {
    let base = dirs::data_dir().ok_or(PathError::NoDataDir)?;
    let dir = base.join("zsm").join(app);
    std::fs::create_dir_all(&dir).map_err(PathError::Io)?;
    Ok(dir)
}

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("could not determine the platform data directory")]
    NoDataDir,
    #[error("failed to create data directory: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn creates_app_dir() {
        let dir = app_data_dir("zen-test").expect("data dir resolves in test env");
        assert!(dir.ends_with("zsm/zen-test"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
