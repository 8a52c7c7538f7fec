use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

use crate::command;
use crate::error::RenderError;
use crate::tunnel::TunnelConfig;
use crate::{console, supervisor, systemd};

/// Prefix for supervisor program and systemd unit names.
pub const PROGRAM_PREFIX: &str = "rev-tun";

/// Where a tunnel gets registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RegisterType {
    #[default]
    Supervisor,
    Systemd,
    Console,
}

impl std::fmt::Display for RegisterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supervisor => f.write_str("supervisor"),
            Self::Systemd => f.write_str("systemd"),
            Self::Console => f.write_str("console"),
        }
    }
}

/// Everything a backend needs to know about a tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub retry: u32,
    pub command: Vec<String>,
}

impl Registration {
    pub fn from_config(config: &TunnelConfig) -> Result<Self, RenderError> {
        Ok(Self {
            name: config.name().to_string(),
            retry: config.connection().retry,
            command: command::render_args(config)?,
        })
    }

    /// `rev-tun-<name>`, used for program, unit and log file names.
    pub fn program(&self) -> String {
        format!("{}-{}", PROGRAM_PREFIX, self.name)
    }

    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    /// The command with every argument quoted by [`quote_arg`], for
    /// supervisor `command=` and systemd `ExecStart=` lines.
    pub fn service_command_line(&self) -> String {
        self.command
            .iter()
            .map(|arg| quote_arg(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Quote one argument for a service manager command line.
///
/// supervisord and systemd both split on whitespace, read double quotes with
/// backslash escapes, and treat `%` as a specifier, so `%` becomes `%%`.
pub fn quote_arg(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\'));
    let arg = if needs_quotes {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        arg.to_string()
    };
    arg.replace('%', "%%")
}

/// Hand a tunnel over to the chosen backend.
pub fn register(kind: RegisterType, reg: &Registration, log_dir: &Path) -> Result<()> {
    match kind {
        RegisterType::Supervisor => supervisor::register(reg, log_dir),
        RegisterType::Systemd => systemd::register(reg, log_dir),
        RegisterType::Console => console::run(reg, log_dir),
    }
}

/// Supervisor and systemd write into system directories.
pub fn require_root() -> Result<()> {
    if unsafe { libc::geteuid() } != 0 {
        anyhow::bail!("root privileges are required");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    #[test]
    fn registration_from_config() {
        let cfg = config::parse(
            "office",
            Path::new("office.toml"),
            "server = { addr = \"10.0.0.1\" }\nconnection = { retry = 4 }",
            None,
        )
        .unwrap();
        let reg = Registration::from_config(&cfg).unwrap();
        assert_eq!(reg.name, "office");
        assert_eq!(reg.retry, 4);
        assert_eq!(reg.program(), "rev-tun-office");
        assert_eq!(reg.command[0], "ssh");
        assert_eq!(reg.command_line(), command::render(&cfg).unwrap());
    }

    #[test]
    fn registration_propagates_mismatch() {
        let cfg = config::parse(
            "office",
            Path::new("office.toml"),
            "server = { addr = \"10.0.0.1\" }\n[services.x]\nlocal_ports = \"1,2\"\nremote_ports = \"1\"",
            None,
        )
        .unwrap();
        assert!(matches!(
            Registration::from_config(&cfg),
            Err(RenderError::PortMismatch { .. })
        ));
    }

    #[test]
    fn quoting_keeps_argument_boundaries() {
        assert_eq!(quote_arg("-N"), "-N");
        assert_eq!(quote_arg("root@10.0.0.1"), "root@10.0.0.1");
        assert_eq!(quote_arg("/root/my keys/id"), "\"/root/my keys/id\"");
        assert_eq!(quote_arg("say \"hi\""), r#""say \"hi\"""#);
        assert_eq!(quote_arg(r"C:\keys"), r#""C:\\keys""#);
        assert_eq!(quote_arg(""), "\"\"");
    }

    #[test]
    fn quoting_doubles_percent() {
        assert_eq!(quote_arg("%h:%p"), "%%h:%%p");
        assert_eq!(
            quote_arg("proxyCommand=ssh -W %h:%p jump"),
            "\"proxyCommand=ssh -W %%h:%%p jump\""
        );
    }

    #[test]
    fn service_command_line_quotes_each_argument() {
        let reg = Registration {
            name: "office".to_string(),
            retry: 3,
            command: vec![
                "ssh".to_string(),
                "-i".to_string(),
                "/root/my keys/id".to_string(),
            ],
        };
        assert_eq!(reg.service_command_line(), "ssh -i \"/root/my keys/id\"");
        assert_eq!(reg.command_line(), "ssh -i /root/my keys/id");
    }

    #[test]
    fn register_type_parses_lowercase() {
        #[derive(Deserialize)]
        struct Holder {
            kind: RegisterType,
        }
        let h: Holder = toml::from_str("kind = \"systemd\"").unwrap();
        assert_eq!(h.kind, RegisterType::Systemd);
        assert_eq!(RegisterType::default().to_string(), "supervisor");
    }
}
