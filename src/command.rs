//! Rendering a [`TunnelConfig`] into an ssh invocation.
//!
//! The command is built from three sections, always in this order: the
//! server endpoint, client `-o` options, then one forward per port pair of
//! every enabled service.

use std::net::IpAddr;

use tracing::debug;

use crate::error::RenderError;
use crate::naming::{self, NamingStyle};
use crate::options::{self, OptionValue};
use crate::tunnel::{ForwardingMode, ServerEndpoint, ServiceConfig, SshOptions, TunnelConfig};

pub const PROGRAM: &str = "ssh";

enum Section<'a> {
    Server(&'a ServerEndpoint),
    SshOptions(&'a SshOptions),
    Services(&'a [ServiceConfig]),
}

impl Section<'_> {
    fn render(&self, args: &mut Vec<String>) -> Result<(), RenderError> {
        match self {
            Section::Server(server) => render_server(server, args),
            Section::SshOptions(opts) => render_ssh_options(opts, args),
            Section::Services(services) => {
                for service in services.iter().filter(|s| s.enable) {
                    render_service(service, args)?;
                }
            }
        }
        Ok(())
    }
}

fn render_server(server: &ServerEndpoint, args: &mut Vec<String>) {
    args.push(format!("{}@{}", server.user, server.addr));
    for (name, value) in server.options.iter() {
        let Some(flag) = options::server_flag(name) else {
            debug!(option = name, "no ssh flag for server option, skipping");
            continue;
        };
        match value {
            OptionValue::Bool(false) => {}
            OptionValue::Bool(true) => args.push(flag.to_string()),
            other => {
                args.push(flag.to_string());
                args.push(other.to_string());
            }
        }
    }
}

fn render_ssh_options(opts: &SshOptions, args: &mut Vec<String>) {
    for (name, value) in opts.iter() {
        let Some(key) = options::client_option(&naming::convert(name, NamingStyle::Camel)) else {
            debug!(option = name, "not a known ssh client option, skipping");
            continue;
        };
        args.push("-o".to_string());
        args.push(format!("{}={}", key, value));
    }
}

/// IPv6 addresses need brackets inside a forward spec.
fn host(addr: &IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    }
}

fn render_service(service: &ServiceConfig, args: &mut Vec<String>) -> Result<(), RenderError> {
    let pairs = service
        .local_ports
        .pair_with(&service.remote_ports)
        .ok_or_else(|| RenderError::PortMismatch {
            service: service.name.clone(),
            local: service.local_ports.len(),
            remote: service.remote_ports.len(),
        })?;
    let local_addr = host(&service.local_addr);
    let remote_addr = host(&service.remote_addr);
    for (local, remote) in pairs {
        match service.forwarding_mode {
            ForwardingMode::Local => {
                args.push("-L".to_string());
                args.push(format!("{}:{}:{}:{}", local_addr, local, remote_addr, remote));
            }
            ForwardingMode::Remote => {
                args.push("-R".to_string());
                args.push(format!("{}:{}:{}:{}", remote_addr, remote, local_addr, local));
            }
        }
    }
    Ok(())
}

/// The full argument vector, starting with `ssh`.
pub fn render_args(config: &TunnelConfig) -> Result<Vec<String>, RenderError> {
    let sections = [
        Section::Server(config.server()),
        Section::SshOptions(config.ssh_options()),
        Section::Services(config.services()),
    ];
    let mut args = vec![PROGRAM.to_string()];
    for section in &sections {
        section.render(&mut args)?;
    }
    debug!(tunnel = config.name(), args = args.len(), "rendered ssh command");
    Ok(args)
}

/// The command as a single space-separated line, for unit files.
pub fn render(config: &TunnelConfig) -> Result<String, RenderError> {
    Ok(render_args(config)?.join(" "))
}
