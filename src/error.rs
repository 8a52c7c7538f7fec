//! Error types for loading and rendering tunnel configs.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a file on disk into a [`TunnelConfig`](crate::tunnel::TunnelConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}{field}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        field: FieldPath,
        #[source]
        source: toml::de::Error,
    },
}

/// Dotted location of the offending value inside a config file.
/// Empty for document-level failures such as TOML syntax errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Option<String>);

impl FieldPath {
    pub fn root() -> Self {
        Self(None)
    }

    pub fn new(path: impl Into<String>) -> Self {
        Self(Some(path.into()))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(p) => write!(f, " at `{}`", p),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("unsupported naming style: {0}")]
    UnsupportedStyle(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortsError {
    #[error("malformed port spec '{spec}': {reason}")]
    Malformed { spec: String, reason: String },

    #[error("duplicate port number {0}")]
    Duplicate(u16),
}

impl PortsError {
    pub(crate) fn malformed(spec: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error(
        "service '{service}': {local} local port(s) cannot be matched with {remote} remote port(s)"
    )]
    PortMismatch {
        service: String,
        local: usize,
        remote: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::Error as _;

    #[test]
    fn parse_error_mentions_field() {
        let err = ConfigError::Parse {
            path: PathBuf::from("/etc/rev-tun/web.toml"),
            field: FieldPath::new("server"),
            source: toml::de::Error::missing_field("addr"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("failed to parse /etc/rev-tun/web.toml at `server`:"));
        assert!(msg.contains("addr"));
    }

    #[test]
    fn parse_error_without_field() {
        let err = ConfigError::Parse {
            path: PathBuf::from("web.toml"),
            field: FieldPath::root(),
            source: toml::de::Error::custom("expected `=`"),
        };
        assert!(err.to_string().starts_with("failed to parse web.toml: "));
    }

    #[test]
    fn port_mismatch_names_service() {
        let err = RenderError::PortMismatch {
            service: "web".to_string(),
            local: 2,
            remote: 3,
        };
        assert!(err.to_string().contains("'web'"));
    }
}
