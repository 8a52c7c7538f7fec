use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use serde::Deserialize;

use crate::options::{OptionMap, OptionValue};
use crate::ports::Ports;

pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_RETRY: u32 = 3;

/// Which side of the connection a forwarded port is bound on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardingMode {
    /// `-R`: listen on the server, connect out from the client.
    #[default]
    Remote,
    /// `-L`: listen on the client, connect out from the server.
    Local,
}

impl fmt::Display for ForwardingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => f.write_str("remote"),
            Self::Local => f.write_str("local"),
        }
    }
}

fn enabled() -> bool {
    true
}

fn localhost() -> IpAddr {
    LOCALHOST
}

/// A `[services.<name>]` table as written in the file. The forwarding mode
/// stays optional here so it can fall back to the tunnel-level default.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSpec {
    #[serde(default = "enabled")]
    pub enable: bool,
    pub local_ports: Ports,
    #[serde(default = "localhost")]
    pub local_addr: IpAddr,
    pub remote_ports: Ports,
    #[serde(default = "localhost")]
    pub remote_addr: IpAddr,
    #[serde(default)]
    pub forwarding_mode: Option<ForwardingMode>,
}

/// One forwarding rule of a tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: String,
    pub enable: bool,
    pub local_ports: Ports,
    pub local_addr: IpAddr,
    pub remote_ports: Ports,
    pub remote_addr: IpAddr,
    pub forwarding_mode: ForwardingMode,
}

impl ServiceConfig {
    pub fn from_spec(name: impl Into<String>, spec: ServiceSpec, inherited: ForwardingMode) -> Self {
        Self {
            name: name.into(),
            enable: spec.enable,
            local_ports: spec.local_ports,
            local_addr: spec.local_addr,
            remote_ports: spec.remote_ports,
            remote_addr: spec.remote_addr,
            forwarding_mode: spec.forwarding_mode.unwrap_or(inherited),
        }
    }
}

/// Short description like `L:8080→10.0.0.1:80, L:8443→10.0.0.1:443`.
impl fmt::Display for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.forwarding_mode {
            ForwardingMode::Local => "L",
            ForwardingMode::Remote => "R",
        };
        match self.local_ports.pair_with(&self.remote_ports) {
            Some(pairs) => {
                let parts: Vec<String> = pairs
                    .map(|(local, remote)| match self.forwarding_mode {
                        ForwardingMode::Local => {
                            format!("{}:{}→{}:{}", tag, local, self.remote_addr, remote)
                        }
                        ForwardingMode::Remote => {
                            format!("{}:{}→{}:{}", tag, remote, self.local_addr, local)
                        }
                    })
                    .collect();
                f.write_str(&parts.join(", "))
            }
            None => write!(
                f,
                "{}:{} ≠ {}",
                tag, self.local_ports, self.remote_ports
            ),
        }
    }
}

/// `[server]` as written; see [`ServerEndpoint`] for the resolved form.
#[derive(Debug, Clone, Deserialize)]
pub struct RawServer {
    #[serde(default)]
    user: Option<String>,
    addr: IpAddr,
    #[serde(flatten)]
    options: OptionMap,
}

/// The ssh server to connect to, plus server-side flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawServer")]
pub struct ServerEndpoint {
    pub user: String,
    pub addr: IpAddr,
    /// Everything except `user` and `addr`, defaults first.
    pub options: OptionMap,
}

impl ServerEndpoint {
    pub fn defaults() -> [(&'static str, OptionValue); 2] {
        [
            ("no_remote_command", OptionValue::Bool(true)),
            ("disable_pty", OptionValue::Bool(true)),
        ]
    }
}

impl From<RawServer> for ServerEndpoint {
    fn from(raw: RawServer) -> Self {
        Self {
            user: raw.user.unwrap_or_else(|| DEFAULT_USER.to_string()),
            addr: raw.addr,
            options: raw.options.with_defaults(&Self::defaults()),
        }
    }
}

/// Client options rendered as `-o Key=value`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "OptionMap")]
pub struct SshOptions(OptionMap);

impl SshOptions {
    pub fn defaults() -> [(&'static str, OptionValue); 2] {
        [
            ("server_alive_interval", OptionValue::Integer(60)),
            ("server_alive_count_max", OptionValue::Integer(3)),
        ]
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter()
    }
}

impl Default for SshOptions {
    fn default() -> Self {
        Self::from(OptionMap::new())
    }
}

impl From<OptionMap> for SshOptions {
    fn from(map: OptionMap) -> Self {
        Self(map.with_defaults(&Self::defaults()))
    }
}

/// How the console runner treats failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionPolicy {
    /// Attempt budget for the console runner, `startretries` for supervisor,
    /// `StartLimitBurst` for systemd.
    pub retry: u32,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            retry: DEFAULT_RETRY,
        }
    }
}

/// A fully validated tunnel definition, built by [`crate::config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    name: String,
    server: ServerEndpoint,
    connection: ConnectionPolicy,
    ssh_options: SshOptions,
    services: Vec<ServiceConfig>,
}

impl TunnelConfig {
    pub(crate) fn new(
        name: String,
        server: ServerEndpoint,
        connection: ConnectionPolicy,
        ssh_options: SshOptions,
        services: Vec<ServiceConfig>,
    ) -> Self {
        Self {
            name,
            server,
            connection,
            ssh_options,
            services,
        }
    }

    /// Base name of the file this tunnel was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server(&self) -> &ServerEndpoint {
        &self.server
    }

    pub fn connection(&self) -> &ConnectionPolicy {
        &self.connection
    }

    pub fn ssh_options(&self) -> &SshOptions {
        &self.ssh_options
    }

    /// Services in file order.
    pub fn services(&self) -> &[ServiceConfig] {
        &self.services
    }

    pub fn enabled_services(&self) -> impl Iterator<Item = &ServiceConfig> {
        self.services.iter().filter(|s| s.enable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let server: ServerEndpoint = toml::from_str(r#"addr = "1.2.3.4""#).unwrap();
        assert_eq!(server.user, "root");
        assert_eq!(server.addr, "1.2.3.4".parse::<IpAddr>().unwrap());
        let keys: Vec<&str> = server.options.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["no_remote_command", "disable_pty"]);
    }

    #[test]
    fn server_extra_options_follow_defaults() {
        let server: ServerEndpoint = toml::from_str(
            "user = \"tunnel\"\naddr = \"10.0.0.1\"\nport = 2222\ndisable_pty = false",
        )
        .unwrap();
        assert_eq!(server.user, "tunnel");
        assert_eq!(server.options.get("port"), Some(&OptionValue::Integer(2222)));
        assert_eq!(server.options.get("disable_pty"), Some(&OptionValue::Bool(false)));
        assert_eq!(server.options.get("user"), None);
        assert_eq!(server.options.get("addr"), None);
    }

    #[test]
    fn server_requires_addr() {
        let err = toml::from_str::<ServerEndpoint>(r#"user = "root""#).unwrap_err();
        assert!(err.to_string().contains("addr"));
    }

    #[test]
    fn server_rejects_bad_addr() {
        assert!(toml::from_str::<ServerEndpoint>(r#"addr = "example.com""#).is_err());
    }

    #[test]
    fn ssh_options_defaults() {
        let opts = SshOptions::default();
        assert_eq!(opts.get("server_alive_interval"), Some(&OptionValue::Integer(60)));
        assert_eq!(opts.get("server_alive_count_max"), Some(&OptionValue::Integer(3)));
    }

    #[test]
    fn ssh_options_override_defaults() {
        let opts: SshOptions =
            toml::from_str("server_alive_interval = 15\nexit_on_forward_failure = true").unwrap();
        assert_eq!(opts.get("server_alive_interval"), Some(&OptionValue::Integer(15)));
        assert_eq!(opts.get("server_alive_count_max"), Some(&OptionValue::Integer(3)));
        assert_eq!(opts.get("exit_on_forward_failure"), Some(&OptionValue::Bool(true)));
    }

    #[test]
    fn connection_default_retry() {
        let policy: ConnectionPolicy = toml::from_str("").unwrap();
        assert_eq!(policy.retry, 3);
        let policy: ConnectionPolicy = toml::from_str("retry = 0").unwrap();
        assert_eq!(policy.retry, 0);
        assert!(toml::from_str::<ConnectionPolicy>("retry = -1").is_err());
    }

    #[test]
    fn service_spec_defaults() {
        let spec: ServiceSpec =
            toml::from_str("local_ports = \"8080\"\nremote_ports = [80]").unwrap();
        assert!(spec.enable);
        assert_eq!(spec.local_addr, LOCALHOST);
        assert_eq!(spec.remote_addr, LOCALHOST);
        assert_eq!(spec.forwarding_mode, None);
    }

    #[test]
    fn service_inherits_mode() {
        let spec: ServiceSpec =
            toml::from_str("local_ports = \"8080\"\nremote_ports = \"80\"").unwrap();
        let svc = ServiceConfig::from_spec("web", spec.clone(), ForwardingMode::Local);
        assert_eq!(svc.forwarding_mode, ForwardingMode::Local);

        let mut own = spec;
        own.forwarding_mode = Some(ForwardingMode::Remote);
        let svc = ServiceConfig::from_spec("web", own, ForwardingMode::Local);
        assert_eq!(svc.forwarding_mode, ForwardingMode::Remote);
    }

    #[test]
    fn service_rejects_unknown_mode() {
        let res = toml::from_str::<ServiceSpec>(
            "local_ports = \"1\"\nremote_ports = \"1\"\nforwarding_mode = \"dynamic\"",
        );
        assert!(res.is_err());
    }

    #[test]
    fn service_display() {
        let spec: ServiceSpec = toml::from_str(
            "local_ports = \"8080,8443\"\nremote_ports = \"80,443\"\nremote_addr = \"10.0.0.1\"",
        )
        .unwrap();
        let svc = ServiceConfig::from_spec("web", spec, ForwardingMode::Local);
        assert_eq!(svc.to_string(), "L:8080→10.0.0.1:80, L:8443→10.0.0.1:443");
    }
}
