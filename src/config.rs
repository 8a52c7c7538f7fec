//! Loading tunnel definitions from a configuration directory.
//!
//! A directory holds one `<name>.toml` per tunnel and an optional
//! `default.toml` that is merged beneath every one of them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::{DeserializeOwned, Error as _};
use toml::{Table, Value};
use tracing::{debug, warn};

use crate::error::{ConfigError, FieldPath};
use crate::merge;
use crate::naming::NamingStyle;
use crate::tunnel::{
    ConnectionPolicy, ForwardingMode, ServerEndpoint, ServiceConfig, ServiceSpec, SshOptions,
    TunnelConfig,
};

pub const DEFAULT_FILE: &str = "default.toml";

const DEFAULT_TEMPLATE: &str = include_str!("../templates/default.toml");
const EXAMPLE_TEMPLATE: &str = include_str!("../templates/example.toml");

/// Result of loading one file in a batch.
pub type Loaded = (PathBuf, Result<TunnelConfig, ConfigError>);

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

fn decode(path: &Path, text: &str) -> Result<Table, ConfigError> {
    toml::from_str::<Table>(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        field: FieldPath::root(),
        source,
    })
}

/// Tunnel name for a config path: the file name without `.toml`.
pub fn tunnel_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read a defaults file into a raw tree. Keys are not normalized yet.
pub fn load_defaults_file(path: &Path) -> Result<Value, ConfigError> {
    let text = read(path)?;
    Ok(Value::Table(decode(path, &text)?))
}

/// Read `dir/default.toml` if it exists.
pub fn load_defaults(dir: &Path) -> Result<Option<Value>, ConfigError> {
    let path = dir.join(DEFAULT_FILE);
    if !path.exists() {
        return Ok(None);
    }
    load_defaults_file(&path).map(Some)
}

/// Load one tunnel file, merging `defaults` beneath it when given.
pub fn load(path: &Path, defaults: Option<&Value>) -> Result<TunnelConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let text = read(path)?;
    parse(&tunnel_name(path), path, &text, defaults)
}

/// Build a tunnel from file contents. `path` is only used in error messages.
pub fn parse(
    name: &str,
    path: &Path,
    text: &str,
    defaults: Option<&Value>,
) -> Result<TunnelConfig, ConfigError> {
    let file = merge::normalize_table(decode(path, text)?, NamingStyle::Snake);
    let mut root = match defaults {
        Some(Value::Table(base)) => {
            let base = merge::normalize_table(base.clone(), NamingStyle::Snake);
            merge::merge_tables(&base, &file)
        }
        Some(_) => {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                field: FieldPath::root(),
                source: toml::de::Error::custom("defaults must be a table"),
            });
        }
        None => file,
    };
    // The name always comes from the file name.
    if root.remove("name").is_some() {
        debug!(tunnel = name, "ignoring `name` key in file");
    }

    let server: ServerEndpoint = match root.remove("server") {
        Some(v) => section(path, "server", v)?,
        None => {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                field: FieldPath::new("server"),
                source: toml::de::Error::missing_field("server"),
            });
        }
    };

    let connection: ConnectionPolicy = root
        .remove("connection")
        .map(|v| section(path, "connection", v))
        .transpose()?
        .unwrap_or_default();

    let ssh_options: SshOptions = match (root.remove("ssh"), root.remove("ssh_config")) {
        (None, None) => SshOptions::default(),
        (Some(v), None) => section(path, "ssh", v)?,
        (None, Some(v)) => section(path, "ssh_config", v)?,
        (Some(ssh), Some(ssh_config)) => {
            match section(path, "ssh_config", merge::merge(&ssh, &ssh_config)) {
                Ok(opts) => opts,
                Err(merged) => {
                    // Point at the table the bad value came from.
                    section::<SshOptions>(path, "ssh", ssh)?;
                    section::<SshOptions>(path, "ssh_config", ssh_config)?;
                    return Err(merged);
                }
            }
        }
    };

    let mode: ForwardingMode = root
        .remove("forwarding_mode")
        .map(|v| section(path, "forwarding_mode", v))
        .transpose()?
        .unwrap_or_default();

    let services = match root.remove("services") {
        Some(Value::Table(table)) => {
            let mut services = Vec::with_capacity(table.len());
            for (service, value) in table {
                let field = format!("services.{}", service);
                let spec: ServiceSpec = section(path, &field, value)?;
                services.push(ServiceConfig::from_spec(service, spec, mode));
            }
            services
        }
        Some(other) => {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                field: FieldPath::new("services"),
                source: toml::de::Error::custom(format!(
                    "expected a table of services, found {}",
                    other.type_str()
                )),
            });
        }
        None => Vec::new(),
    };

    for key in root.keys() {
        debug!(tunnel = name, key = %key, "ignoring unknown top-level key");
    }

    debug!(
        tunnel = name,
        services = services.len(),
        retry = connection.retry,
        "loaded tunnel config"
    );
    Ok(TunnelConfig::new(
        name.to_string(),
        server,
        connection,
        ssh_options,
        services,
    ))
}

fn section<T: DeserializeOwned>(path: &Path, field: &str, value: Value) -> Result<T, ConfigError> {
    T::deserialize(value).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        field: FieldPath::new(field),
        source,
    })
}

/// Every tunnel file in `dir` (all `*.toml` except `default.toml`), sorted.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::NotFound(dir.to_path_buf()));
    }
    let pattern = format!(
        "{}/*.toml",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let entries = glob::glob(&pattern).map_err(|e| ConfigError::Read {
        path: dir.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, e),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => {
                if path.file_name().is_some_and(|n| n == DEFAULT_FILE) {
                    continue;
                }
                paths.push(path);
            }
            Ok(_) => {}
            Err(e) => warn!(path = %e.path().display(), "skipping unreadable entry: {}", e),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Load every tunnel in `dir`.
///
/// Fails as a whole only if the directory is missing or `default.toml` is
/// broken; a bad tunnel file shows up as an `Err` next to its path.
pub fn load_all(dir: &Path) -> Result<Vec<Loaded>, ConfigError> {
    let paths = discover(dir)?;
    let defaults = load_defaults(dir)?;
    Ok(paths
        .into_iter()
        .map(|path| {
            let result = load(&path, defaults.as_ref());
            if let Err(ref e) = result {
                debug!(path = %path.display(), "failed to load tunnel: {}", e);
            }
            (path, result)
        })
        .collect())
}

/// Load `dir/<name>.toml` with the directory defaults applied.
pub fn load_named(dir: &Path, name: &str) -> Result<TunnelConfig, ConfigError> {
    let defaults = load_defaults(dir)?;
    load(&dir.join(format!("{}.toml", name)), defaults.as_ref())
}

/// Create the configuration directory with a commented `default.toml` and an
/// `example.toml.sample`. Existing files are left alone. Returns the paths
/// that were written.
pub fn init(dir: &Path) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (file, content) in [
        (DEFAULT_FILE, DEFAULT_TEMPLATE),
        ("example.toml.sample", EXAMPLE_TEMPLATE),
    ] {
        let path = dir.join(file);
        if path.exists() {
            continue;
        }
        fs::write(&path, content)?;
        written.push(path);
    }
    Ok(written)
}
