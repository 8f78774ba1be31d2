//! Platform-specific configuration paths.
//!
//! - **User config**: `~/.config/chirp/config.toml` (Linux),
//!   `~/Library/Application Support/chirp/config.toml` (macOS),
//!   `%APPDATA%\chirp\config.toml` (Windows)
//! - **System config**: `/etc/chirp/config.toml` (Unix only)
//!
//! The `CHIRP_CONFIG` environment variable names a file that takes precedence
//! over both.

use std::path::{Path, PathBuf};

/// Application name used for directory paths.
const APP_NAME: &str = "chirp";

/// File name of the configuration inside a config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "CHIRP_CONFIG";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the user configuration file path, whether or not it exists.
pub fn user_config_file() -> PathBuf {
    user_config_dir().join(CONFIG_FILE_NAME)
}

/// Returns the system-wide configuration file, if the platform has one.
pub fn system_config_file() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        Some(PathBuf::from("/etc").join(APP_NAME).join(CONFIG_FILE_NAME))
    }
    #[cfg(not(unix))]
    {
        None
    }
}

/// Find the config file to load.
///
/// Searches in order: `explicit`, the `CHIRP_CONFIG` variable, the user file,
/// the system file. An explicit path is returned even if it does not exist,
/// so the caller reports it instead of silently using defaults. Returns
/// `None` when nothing is found.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    find_config_in(from_env, user_config_file(), system_config_file())
}

fn find_config_in(
    from_env: Option<PathBuf>,
    user: PathBuf,
    system: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = from_env
        && !path.as_os_str().is_empty()
    {
        return Some(path);
    }
    if user.is_file() {
        return Some(user);
    }
    system.filter(|path| path.is_file())
}

/// Ensure the user config directory exists.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_user_config_dir() -> Result<PathBuf, crate::ConfigError> {
    let dir = user_config_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::ConfigError::create_dir(&dir, e))?;
    }

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_user_config_file() {
        let file = user_config_file();
        assert!(file.ends_with("chirp/config.toml") || file.ends_with("chirp\\config.toml"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = Path::new("/no/such/chirp.toml");
        assert_eq!(find_config(Some(explicit)), Some(explicit.to_path_buf()));
    }

    #[test]
    fn test_env_then_user_then_system() {
        let temp_dir = TempDir::new().unwrap();
        let user = temp_dir.path().join("user.toml");
        let system = temp_dir.path().join("system.toml");
        let env = temp_dir.path().join("env.toml");

        assert_eq!(find_config_in(None, user.clone(), Some(system.clone())), None);

        fs::write(&system, "").unwrap();
        assert_eq!(
            find_config_in(None, user.clone(), Some(system.clone())),
            Some(system.clone())
        );

        fs::write(&user, "").unwrap();
        assert_eq!(
            find_config_in(None, user.clone(), Some(system.clone())),
            Some(user.clone())
        );

        assert_eq!(
            find_config_in(Some(env.clone()), user, Some(system)),
            Some(env)
        );
    }

    #[test]
    fn test_empty_env_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let user = temp_dir.path().join("config.toml");
        fs::write(&user, "").unwrap();
        assert_eq!(
            find_config_in(Some(PathBuf::new()), user.clone(), None),
            Some(user)
        );
    }
}
