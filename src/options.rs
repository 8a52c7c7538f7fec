//! Open-ended option maps and the tables that turn them into ssh flags.
//!
//! Server and client option blocks accept any key. Keys are kept as written
//! (after snake-case normalization) and only checked against the lookup
//! tables below when a command is rendered.

use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

/// Server-side options that map onto a dedicated ssh command-line flag.
pub const SERVER_FLAGS: &[(&str, &str)] = &[
    ("no_remote_command", "-N"),
    ("disable_pty", "-T"),
    ("force_pty", "-t"),
    ("background", "-f"),
    ("compression", "-C"),
    ("gateway_ports", "-g"),
    ("forward_agent", "-A"),
    ("ipv4_only", "-4"),
    ("ipv6_only", "-6"),
    ("quiet", "-q"),
    ("verbose", "-v"),
    ("port", "-p"),
    ("identity_file", "-i"),
    ("config_file", "-F"),
    ("jump_host", "-J"),
    ("bind_address", "-b"),
    ("cipher_spec", "-c"),
    ("log_file", "-E"),
];

/// Client options passed through as `-o Name=value`, in camelCase.
pub const CLIENT_OPTIONS: &[&str] = &[
    "addressFamily",
    "batchMode",
    "bindAddress",
    "ciphers",
    "compression",
    "connectTimeout",
    "connectionAttempts",
    "controlMaster",
    "controlPath",
    "controlPersist",
    "exitOnForwardFailure",
    "gatewayPorts",
    "hostKeyAlgorithms",
    "hostKeyAlias",
    "identitiesOnly",
    "identityFile",
    "ipQoS",
    "kexAlgorithms",
    "logLevel",
    "macs",
    "passwordAuthentication",
    "port",
    "preferredAuthentications",
    "proxyCommand",
    "proxyJump",
    "pubkeyAuthentication",
    "rekeyLimit",
    "serverAliveCountMax",
    "serverAliveInterval",
    "streamLocalBindUnlink",
    "strictHostKeyChecking",
    "tcpKeepAlive",
    "userKnownHostsFile",
];

pub fn server_flag(name: &str) -> Option<&'static str> {
    SERVER_FLAGS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, flag)| *flag)
}

/// Canonical spelling of a client option; ssh matches names case-insensitively.
pub fn client_option(camel_name: &str) -> Option<&'static str> {
    CLIENT_OPTIONS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(camel_name))
        .copied()
}

/// Scalar value of a free-form option.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Booleans print as `yes`/`no`, the spelling ssh_config(5) expects.
impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("yes"),
            Self::Bool(false) => f.write_str("no"),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Insertion-ordered map from option name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap(Vec<(String, OptionValue)>);

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set `key`, replacing the value in place if it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Put `defaults` first, then every entry of `self` in order. Entries in
    /// `self` override defaults with the same key.
    pub fn with_defaults(self, defaults: &[(&str, OptionValue)]) -> Self {
        let mut out = OptionMap::new();
        for (key, value) in defaults {
            out.insert(*key, value.clone());
        }
        for (key, value) in self.0 {
            out.insert(key, value);
        }
        out
    }
}

struct OptionMapVisitor;

impl<'de> Visitor<'de> for OptionMapVisitor {
    type Value = OptionMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a table of boolean, integer or string options")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<OptionMap, A::Error> {
        let mut map = OptionMap::new();
        while let Some((key, value)) = access.next_entry::<String, OptionValue>()? {
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<'de> Deserialize<'de> for OptionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OptionMapVisitor)
    }
}
