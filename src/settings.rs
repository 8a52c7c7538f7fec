use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use clap_complete::Shell;
use rev_tun::register::RegisterType;

pub const DEFAULT_CONF_DIR: &str = "/etc/rev-tun";
pub const DEFAULT_LOG_DIR: &str = "/var/log/rev-tun";

fn settings_path() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .context("cannot determine home directory")?
        .join(".rev-tun");
    Ok(dir.join("config.toml"))
}

/// Defaults for the command line, read from `~/.rev-tun/config.toml`.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the tunnel files
    pub conf_dir: Option<PathBuf>,
    /// Directory for supervisor, systemd and console logs
    pub log_dir: Option<PathBuf>,
    /// Backend used by `rev-tun register` when `-r` is omitted
    pub register: Option<RegisterType>,
    /// Shell for completions (bash, zsh, fish)
    pub shell: Option<String>,
}

impl Settings {
    /// Load settings, falling back to defaults when missing or unreadable.
    pub fn load() -> Self {
        match settings_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => Self::default(),
        }
    }

    fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring settings file: {}", e);
                Self::default()
            }
        }
    }

    /// Command line > settings file > `/etc/rev-tun`.
    pub fn conf_dir(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.conf_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONF_DIR))
    }

    /// Command line > settings file > `/var/log/rev-tun`.
    pub fn log_dir(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.log_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
    }

    pub fn register(&self, flag: Option<RegisterType>) -> RegisterType {
        flag.or(self.register).unwrap_or_default()
    }

    /// Command line > settings file; there is no built-in shell.
    pub fn shell(&self, flag: Option<Shell>) -> Result<Shell> {
        if let Some(shell) = flag {
            return Ok(shell);
        }
        let location = settings_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "the rev-tun settings file".to_string());
        let name = self.shell.as_deref().with_context(|| {
            format!(
                "no shell given, pass one to `rev-tun completions` or set `shell` in {}",
                location
            )
        })?;
        name.parse::<Shell>()
            .map_err(|_| anyhow::anyhow!("unknown shell '{}' set in {}", name, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults() {
        let s = Settings::default();
        assert_eq!(s.conf_dir(None), PathBuf::from("/etc/rev-tun"));
        assert_eq!(s.log_dir(None), PathBuf::from("/var/log/rev-tun"));
        assert_eq!(s.register(None), RegisterType::Supervisor);
    }

    #[test]
    fn file_overrides_defaults_and_flags_override_file() {
        let s: Settings = toml::from_str(
            r#"
            conf_dir = "/srv/tunnels"
            register = "systemd"
            "#,
        )
        .unwrap();
        assert_eq!(s.conf_dir(None), PathBuf::from("/srv/tunnels"));
        assert_eq!(s.conf_dir(Some("/tmp/t".into())), PathBuf::from("/tmp/t"));
        assert_eq!(s.log_dir(None), PathBuf::from("/var/log/rev-tun"));
        assert_eq!(s.register(None), RegisterType::Systemd);
        assert_eq!(s.register(Some(RegisterType::Console)), RegisterType::Console);
    }

    #[test]
    fn shell_from_flag_or_file() {
        let s = Settings {
            shell: Some("zsh".to_string()),
            ..Settings::default()
        };
        assert_eq!(s.shell(None).unwrap(), Shell::Zsh);
        assert_eq!(s.shell(Some(Shell::Fish)).unwrap(), Shell::Fish);
    }

    #[test]
    fn shell_errors_mention_settings() {
        let err = Settings::default().shell(None).unwrap_err();
        assert!(err.to_string().contains("set `shell` in"), "{err}");

        let s = Settings {
            shell: Some("tcsh".to_string()),
            ..Settings::default()
        };
        assert!(s.shell(None).unwrap_err().to_string().starts_with("unknown shell 'tcsh'"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load_from(&dir.path().join("config.toml")), Settings::default());
    }

    #[test]
    fn broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "register = \"launchd\"").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }
}
